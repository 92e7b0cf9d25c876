//! Request handler abstraction
//!
//! Handlers take a fully-read request and produce a response. Middleware such
//! as [`RequireAuth`](crate::auth::RequireAuth) and [`Cors`](super::Cors) are
//! handlers wrapping other handlers.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::future::Future;
use tracing::error;

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// An endpoint or a middleware around one
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Request<Bytes>) -> HttpResponse;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request<Bytes>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    async fn call(&self, req: Request<Bytes>) -> HttpResponse {
        (self)(req).await
    }
}

/// Serialize `body` as a JSON response
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => Response::builder()
            .status(status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(bytes)))
            .expect("Failed to build JSON response"),
        Err(e) => {
            error!("Failed to serialize response body: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Plain-text response
pub fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("Failed to build text response")
}
