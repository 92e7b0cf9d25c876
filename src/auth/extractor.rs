//! Bearer token extraction from the `Authorization` header

use super::AuthError;
use std::fmt;

/// Compact JWT as presented by the client
///
/// No structural validation happens at extraction time; a malformed token
/// surfaces later as a verification failure.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

/// Parse a raw `Authorization` header value into a bearer token
pub fn extract_bearer_token(header: Option<&str>) -> Result<BearerToken, AuthError> {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => return Err(AuthError::MissingHeader),
    };

    let mut parts = header.split_whitespace();

    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {}
        _ => return Err(AuthError::NotBearer),
    }

    let token = parts.next().ok_or(AuthError::TokenNotFound)?;

    if parts.next().is_some() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(BearerToken(token.to_string()))
}
