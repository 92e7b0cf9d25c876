//! JWT verification against a key set
//!
//! Audience, issuer and algorithm are pinned to configured values; nothing
//! the token says about itself is trusted beyond its `kid`.

use super::jwks::Jwks;
use super::{AuthError, BearerToken, Claims};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::{Map, Value};
use tracing::debug;

/// Issuer Azure AD v1 access tokens carry for a tenant
pub fn tenant_issuer(tenant: &str) -> String {
    format!("https://sts.windows.net/{}/", tenant)
}

/// RS256 token verifier
///
/// # Example
///
/// ```
/// use aad_gateway::auth::TokenVerifier;
///
/// let verifier = TokenVerifier::for_tenant("my-tenant", "api://my-api");
/// assert_eq!(verifier.issuer(), "https://sts.windows.net/my-tenant/");
/// ```
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    audience: String,
    issuer: String,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier that accepts tokens for `audience` issued by `issuer`
    pub fn new(audience: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            audience: audience.to_string(),
            issuer: issuer.to_string(),
            validation,
        }
    }

    /// Create a verifier for an Azure AD tenant
    pub fn for_tenant(tenant: &str, audience: &str) -> Self {
        Self::new(audience, &tenant_issuer(tenant))
    }

    /// Allowed clock skew for `exp`/`nbf` checks, in seconds
    #[must_use]
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.validation.leeway = leeway_secs;
        self
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify `token` against `jwks` and return its claims
    pub fn verify(&self, token: &BearerToken, jwks: &Jwks) -> Result<Claims, AuthError> {
        let header = decode_header(token.as_str()).map_err(|e| {
            debug!(error = %e, "Undecodable token header");
            AuthError::Unparseable
        })?;
        let kid = header.kid.as_deref().ok_or(AuthError::Unparseable)?;

        let mut candidates = jwks.keys_with_id(kid);
        let jwk = candidates.next().ok_or(AuthError::KeyNotFound)?;
        if candidates.next().is_some() {
            return Err(AuthError::AmbiguousKey);
        }

        let decoding_key = jwk.to_decoding_key().map_err(|e| {
            debug!(kid, error = %e, "Unusable signing key");
            AuthError::Unparseable
        })?;

        let token_data = decode::<Map<String, Value>>(token.as_str(), &decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims,
                _ => {
                    debug!(kid, error = %e, "Token verification failed");
                    AuthError::Unparseable
                }
            })?;

        Ok(Claims::from_verified(token_data.claims))
    }
}
