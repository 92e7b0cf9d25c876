//! Coarse scope authorization
//!
//! [`requires_scope`] reads the token's claims *without* verifying them. It
//! must only be called from a handler already wrapped by
//! [`require_auth`](super::require_auth), which verified the same token
//! earlier in the request.

use super::extractor::extract_bearer_token;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hyper::header::AUTHORIZATION;
use hyper::Request;
use serde_json::{Map, Value};

/// Whether the request's bearer token carries `required_scope`
///
/// Returns `false` for a missing or malformed header, an undecodable payload,
/// or a token without a string `scope` claim.
pub fn requires_scope<B>(req: &Request<B>, required_scope: &str) -> bool {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Ok(token) = extract_bearer_token(header) else {
        return false;
    };

    unverified_claims(token.as_str())
        .map(|claims| scope_contains(claims.get("scope").and_then(Value::as_str), required_scope))
        .unwrap_or(false)
}

/// Decode the payload segment of a compact JWT without checking its signature
fn unverified_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub(crate) fn scope_contains(scope: Option<&str>, required: &str) -> bool {
    scope
        .map(|s| s.split_whitespace().any(|token| token == required))
        .unwrap_or(false)
}
