//! Cross-origin headers for browser clients

use super::handler::{Handler, HttpResponse};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
};
use hyper::Request;

/// Request headers browsers may send to the demo routes
pub const ALLOWED_HEADERS: &str = "Content-Type, Authorization";

/// CORS policy applied to a route
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
}

impl CorsPolicy {
    /// Policy allowing `origin`, or any origin for `"*"`
    ///
    /// An origin that is not a valid header value falls back to `"*"`.
    pub fn new(origin: &str) -> Self {
        let allow_origin =
            HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*"));
        Self { allow_origin }
    }

    /// Add the CORS response headers
    pub fn apply(&self, response: &mut HttpResponse) {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        if self.allow_origin != "*" {
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
    }

    /// Add the headers for a preflight answer listing `methods`
    pub fn apply_preflight(&self, response: &mut HttpResponse, methods: &str) {
        self.apply(response);
        if let Ok(value) = HeaderValue::from_str(methods) {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_METHODS, value);
        }
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::new("*")
    }
}

/// Handler that adds CORS headers to whatever `inner` returns, including 401s
pub struct Cors<H> {
    policy: CorsPolicy,
    inner: H,
}

impl<H: Handler> Cors<H> {
    pub fn new(policy: CorsPolicy, inner: H) -> Self {
        Self { policy, inner }
    }
}

#[async_trait]
impl<H: Handler> Handler for Cors<H> {
    async fn call(&self, req: Request<Bytes>) -> HttpResponse {
        let mut response = self.inner.call(req).await;
        self.policy.apply(&mut response);
        response
    }
}
