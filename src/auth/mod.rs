//! Authentication module
//!
//! Verifies Azure AD bearer tokens against the tenant's published JWKS.
//!
//! The pieces compose leaf-first:
//!
//! - [`extractor`] pulls the bearer token out of the `Authorization` header
//! - [`jwks`] fetches (and caches) the signing key set
//! - [`verifier`] checks kid, RS256 signature, issuer, audience and expiry
//! - [`guard`] runs the three in sequence and wraps protected handlers
//! - [`scope`] is a coarse scope check for already-guarded requests

use hyper::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod extractor;
pub mod guard;
pub mod jwks;
pub mod scope;
pub mod verifier;

pub use extractor::{extract_bearer_token, BearerToken};
pub use guard::{require_auth, unauthorized, AuthGuard, RequireAuth};
pub use jwks::{Jwk, Jwks, JwksError, KeySetSource, RemoteJwks, StaticJwks};
pub use scope::requires_scope;
pub use verifier::{tenant_issuer, TokenVerifier};

/// Authentication errors
///
/// Every variant renders as a 401 with a `{code, description}` JSON body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is expected")]
    MissingHeader,

    #[error("Authorization header must start with Bearer")]
    NotBearer,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Authorization header must be Bearer token")]
    MalformedHeader,

    #[error("Unable to parse authentication token")]
    Unparseable,

    #[error("Unable to find appropriate key")]
    KeyNotFound,

    #[error("Ambiguous signing key")]
    AmbiguousKey,

    #[error("token is expired")]
    TokenExpired,

    #[error("incorrect claims, please check the audience and issuer")]
    InvalidClaims,
}

impl AuthError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "authorization_header_missing",
            AuthError::NotBearer
            | AuthError::TokenNotFound
            | AuthError::MalformedHeader
            | AuthError::Unparseable
            | AuthError::KeyNotFound
            | AuthError::AmbiguousKey => "invalid_header",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims => "invalid_claims",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// HTTP status for this error. Always 401.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    /// JSON body sent to the client
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            description: self.description(),
        }
    }
}

/// Wire shape of an authentication failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub description: String,
}

/// Verified token claims
///
/// Only [`TokenVerifier`] can construct this type, so holding a `Claims`
/// means signature, issuer, audience and expiry were all checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub(crate) fn from_verified(payload: Map<String, Value>) -> Self {
        Self(payload)
    }

    /// Look up a claim by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get("iss").and_then(Value::as_str)
    }

    /// Audience claim. Azure issues a single string; array audiences return the first entry.
    pub fn audience(&self) -> Option<&str> {
        match self.get("aud")? {
            Value::String(aud) => Some(aud),
            Value::Array(auds) => auds.first().and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        self.get("sub").and_then(Value::as_str)
    }

    /// Expiry as a unix timestamp
    pub fn expires_at(&self) -> Option<i64> {
        self.get("exp").and_then(Value::as_i64)
    }

    /// Raw space-separated `scope` claim
    pub fn scope(&self) -> Option<&str> {
        self.get("scope").and_then(Value::as_str)
    }

    /// Whether `required` is one of the space-separated scope tokens
    pub fn has_scope(&self, required: &str) -> bool {
        scope::scope_contains(self.scope(), required)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Request-scoped authentication context
///
/// Inserted into the request extensions by [`RequireAuth`] and dropped
/// together with the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
}

impl AuthContext {
    /// Claims attached to this request, if it passed the guard
    pub fn from_request<B>(req: &hyper::Request<B>) -> Option<&AuthContext> {
        req.extensions().get::<AuthContext>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL: [AuthError; 9] = [
        AuthError::MissingHeader,
        AuthError::NotBearer,
        AuthError::TokenNotFound,
        AuthError::MalformedHeader,
        AuthError::Unparseable,
        AuthError::KeyNotFound,
        AuthError::AmbiguousKey,
        AuthError::TokenExpired,
        AuthError::InvalidClaims,
    ];

    #[test]
    fn test_every_error_has_code_and_description() {
        for err in ALL {
            assert!(!err.code().is_empty());
            assert!(!err.description().is_empty());
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(AuthError::TokenExpired.body()).unwrap();
        assert_eq!(
            body,
            json!({"code": "token_expired", "description": "token is expired"})
        );
    }

    #[test]
    fn test_claims_accessors() {
        let payload = json!({
            "iss": "https://sts.windows.net/tenant/",
            "aud": ["api://one", "api://two"],
            "sub": "user123",
            "exp": 1700000000,
            "scope": "read write"
        });
        let Value::Object(map) = payload else {
            unreachable!()
        };
        let claims = Claims::from_verified(map);

        assert_eq!(claims.issuer(), Some("https://sts.windows.net/tenant/"));
        assert_eq!(claims.audience(), Some("api://one"));
        assert_eq!(claims.subject(), Some("user123"));
        assert_eq!(claims.expires_at(), Some(1700000000));
        assert!(claims.has_scope("write"));
        assert!(!claims.has_scope("delete"));
    }
}
