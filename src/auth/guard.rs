//! Authentication guard and request middleware
//!
//! [`AuthGuard`] runs extraction, key retrieval and verification in order.
//! [`require_auth`] wraps a [`Handler`] so that it only runs for requests the
//! guard accepts, with the verified claims available through
//! [`AuthContext::from_request`].
//!
//! # Example
//!
//! ```
//! use aad_gateway::auth::{require_auth, AuthContext, AuthGuard, StaticJwks, TokenVerifier};
//! use aad_gateway::router::{json_response, Handler};
//! use bytes::Bytes;
//! use hyper::{Request, StatusCode};
//! use std::sync::Arc;
//!
//! let guard = Arc::new(AuthGuard::new(
//!     TokenVerifier::for_tenant("my-tenant", "api://my-api"),
//!     Arc::new(StaticJwks::new(Default::default())),
//! ));
//!
//! let whoami = require_auth(guard, |req: Request<Bytes>| async move {
//!     let subject = AuthContext::from_request(&req)
//!         .and_then(|ctx| ctx.claims.subject().map(str::to_string));
//!     json_response(StatusCode::OK, &serde_json::json!({ "sub": subject }))
//! });
//! ```

use super::extractor::extract_bearer_token;
use super::jwks::KeySetSource;
use super::verifier::TokenVerifier;
use super::{AuthContext, AuthError, Claims};
use crate::router::{json_response, Handler, HttpResponse};
use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use hyper::Request;
use std::sync::Arc;
use tracing::{debug, warn};

/// Composes extractor, key source and verifier
pub struct AuthGuard {
    verifier: TokenVerifier,
    keys: Arc<dyn KeySetSource>,
}

impl AuthGuard {
    pub fn new(verifier: TokenVerifier, keys: Arc<dyn KeySetSource>) -> Self {
        Self { verifier, keys }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Authenticate a raw `Authorization` header value
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let result = self.authenticate_inner(authorization).await;
        Self::observe(result)
    }

    /// Log and count the outcome of an attempt
    fn observe(result: Result<Claims, AuthError>) -> Result<Claims, AuthError> {
        match &result {
            Ok(claims) => {
                #[cfg(feature = "metrics")]
                crate::metrics::record_auth_attempt("success");
                let expires = claims
                    .expires_at()
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0));
                debug!(
                    subject = claims.subject().unwrap_or("-"),
                    expires = ?expires,
                    "Authentication successful"
                );
            }
            Err(e) => {
                #[cfg(feature = "metrics")]
                crate::metrics::record_auth_attempt(e.code());
                warn!(code = e.code(), reason = %e, "Authentication failed");
            }
        }

        result
    }

    async fn authenticate_inner(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let token = extract_bearer_token(authorization)?;

        let jwks = self.keys.key_set().await.map_err(|e| {
            warn!(error = %e, "Unable to obtain signing keys");
            AuthError::Unparseable
        })?;

        match self.verifier.verify(&token, &jwks) {
            // The key set may have rotated since it was cached.
            Err(AuthError::KeyNotFound) => match self.keys.refresh().await {
                Ok(Some(fresh)) => self.verifier.verify(&token, &fresh),
                Ok(None) => Err(AuthError::KeyNotFound),
                Err(e) => {
                    warn!(error = %e, "Unable to refresh signing keys");
                    Err(AuthError::Unparseable)
                }
            },
            other => other,
        }
    }

    /// Authenticate the `Authorization` header of a request
    pub async fn authenticate_request<B: Sync>(&self, req: &Request<B>) -> Result<Claims, AuthError> {
        match req.headers().get(AUTHORIZATION).map(|value| value.to_str()) {
            None => self.authenticate(None).await,
            Some(Ok(header)) => self.authenticate(Some(header)).await,
            // Not visible ASCII, so it cannot start with "Bearer ".
            Some(Err(_)) => Self::observe(Err(AuthError::NotBearer)),
        }
    }
}

/// Handler that only runs `inner` for authenticated requests
pub struct RequireAuth<H> {
    guard: Arc<AuthGuard>,
    inner: H,
}

/// Protect `inner` with `guard`
pub fn require_auth<H: Handler>(guard: Arc<AuthGuard>, inner: H) -> RequireAuth<H> {
    RequireAuth { guard, inner }
}

#[async_trait]
impl<H: Handler> Handler for RequireAuth<H> {
    async fn call(&self, mut req: Request<Bytes>) -> HttpResponse {
        match self.guard.authenticate_request(&req).await {
            Ok(claims) => {
                req.extensions_mut().insert(AuthContext { claims });
                self.inner.call(req).await
            }
            Err(err) => unauthorized(&err),
        }
    }
}

/// 401 response for an authentication failure
pub fn unauthorized(err: &AuthError) -> HttpResponse {
    let mut response = json_response(err.status_code(), &err.body());

    let challenge = match err {
        AuthError::MissingHeader => HeaderValue::from_static("Bearer"),
        _ => HeaderValue::from_static("Bearer error=\"invalid_token\""),
    };
    response.headers_mut().insert(WWW_AUTHENTICATE, challenge);

    response
}
