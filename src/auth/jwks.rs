//! JWKS (JSON Web Key Set) retrieval
//!
//! Fetches the tenant's signing keys from
//! `https://login.microsoftonline.com/{tenant}/discovery/v2.0/keys` and keeps
//! a TTL-bounded snapshot of them.
//!
//! # Example
//!
//! ```no_run
//! use aad_gateway::auth::jwks::{jwks_url, KeySetSource, RemoteJwks, DEFAULT_AUTHORITY};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = RemoteJwks::new(jwks_url(DEFAULT_AUTHORITY, "my-tenant"), Duration::from_secs(5))?
//!     .with_cache_ttl(Duration::from_secs(300));
//!
//! let jwks = keys.key_set().await?;
//! println!("{} signing keys", jwks.keys.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Default Azure AD authority host
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Build the JWKS discovery URL for a tenant
pub fn jwks_url(authority: &str, tenant: &str) -> String {
    format!(
        "{}/{}/discovery/v2.0/keys",
        authority.trim_end_matches('/'),
        tenant
    )
}

/// Key set retrieval errors
#[derive(Error, Debug)]
pub enum JwksError {
    #[error("JWKS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JWKS endpoint returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid JWKS document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A single JSON Web Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (Azure publishes "RSA")
    pub kty: String,

    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,

    /// Intended use ("sig" for signature)
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,

    /// Algorithm, usually absent in Azure key sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// RSA modulus (base64url encoded)
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded)
    #[serde(default)]
    pub e: Option<String>,

    /// X.509 certificate thumbprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,

    /// X.509 certificate chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
}

impl Jwk {
    /// Convert an RSA JWK into a signature verification key
    pub fn to_decoding_key(&self) -> Result<DecodingKey, JwksError> {
        if self.kty != "RSA" {
            return Err(JwksError::UnsupportedKeyType(self.kty.clone()));
        }

        let n = self
            .n
            .as_ref()
            .ok_or_else(|| JwksError::InvalidKey("Missing RSA modulus (n)".into()))?;
        let e = self
            .e
            .as_ref()
            .ok_or_else(|| JwksError::InvalidKey("Missing RSA exponent (e)".into()))?;

        DecodingKey::from_rsa_components(n, e)
            .map_err(|e| JwksError::InvalidKey(format!("Invalid RSA key: {}", e)))
    }
}

/// JSON Web Key Set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Parse a key set from a JSON document
    pub fn from_json(json: &str) -> Result<Self, JwksError> {
        Ok(serde_json::from_str(json)?)
    }

    /// All keys carrying the given key id, in set order
    pub fn keys_with_id<'a>(&'a self, kid: &'a str) -> impl Iterator<Item = &'a Jwk> + 'a {
        self.keys
            .iter()
            .filter(move |k| k.kid.as_deref() == Some(kid))
    }
}

/// Source of the current signing key set
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Current key set
    async fn key_set(&self) -> Result<Arc<Jwks>, JwksError>;

    /// Force a re-fetch after a kid miss
    ///
    /// Returns `None` when no fresher set is available.
    async fn refresh(&self) -> Result<Option<Arc<Jwks>>, JwksError> {
        Ok(None)
    }
}

/// Fixed, in-memory key set
#[derive(Debug, Clone)]
pub struct StaticJwks {
    jwks: Arc<Jwks>,
}

impl StaticJwks {
    pub fn new(jwks: Jwks) -> Self {
        Self {
            jwks: Arc::new(jwks),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, JwksError> {
        Ok(Self::new(Jwks::from_json(json)?))
    }
}

#[async_trait]
impl KeySetSource for StaticJwks {
    async fn key_set(&self) -> Result<Arc<Jwks>, JwksError> {
        Ok(Arc::clone(&self.jwks))
    }
}

/// Cached JWKS with metadata
struct CachedJwks {
    jwks: Arc<Jwks>,
    fetched_at: Instant,
}

/// Key set fetched over HTTPS from the identity provider
///
/// With a zero cache TTL every call fetches the set again. Otherwise the
/// last set is shared by all requests until it expires. Refreshes are
/// serialised through a separate lock and fetch without holding the cache,
/// so readers of a fresh set never wait on the network.
pub struct RemoteJwks {
    /// JWKS endpoint URL
    url: String,

    /// HTTP client for fetching keys
    client: reqwest::Client,

    /// Cached keys
    cache: RwLock<Option<CachedJwks>>,

    /// Held by the single in-flight fetch
    refresh_lock: Mutex<()>,

    /// Cache TTL
    cache_ttl: Duration,

    /// Minimum age of the cached set before a kid miss may trigger a re-fetch
    min_refresh_interval: Duration,
}

impl RemoteJwks {
    /// Create a fetcher for `url` whose requests give up after `timeout`
    ///
    /// Caching is off until [`with_cache_ttl`](Self::with_cache_ttl) is set.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.into(),
            client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            cache_ttl: Duration::ZERO,
            min_refresh_interval: Duration::from_secs(30),
        })
    }

    /// Set the cache TTL. Zero disables caching.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Fetch JWKS from endpoint
    async fn fetch(&self) -> Result<Jwks, JwksError> {
        let started = Instant::now();
        let result = self.fetch_inner().await;

        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        crate::metrics::record_jwks_fetch(
            if result.is_ok() { "success" } else { "failure" },
            elapsed.as_secs_f64(),
        );

        match &result {
            Ok(jwks) => debug!(
                url = %self.url,
                keys = jwks.keys.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Fetched JWKS"
            ),
            Err(e) => warn!(url = %self.url, error = %e, "JWKS fetch failed"),
        }

        result
    }

    async fn fetch_inner(&self) -> Result<Jwks, JwksError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(JwksError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Cached set if it is younger than `max_age`
    async fn cached_within(&self, max_age: Duration) -> Option<Arc<Jwks>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < max_age)
            .map(|cached| Arc::clone(&cached.jwks))
    }

    /// Fetch and store a new set unless the cached one is younger than `max_age`
    ///
    /// The returned flag is true when a fetch actually happened. The cache
    /// is only write-locked for the swap.
    async fn fetch_and_store(&self, max_age: Duration) -> Result<(Arc<Jwks>, bool), JwksError> {
        let _refresh = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(jwks) = self.cached_within(max_age).await {
            return Ok((jwks, false));
        }

        let jwks = Arc::new(self.fetch().await?);
        *self.cache.write().await = Some(CachedJwks {
            jwks: Arc::clone(&jwks),
            fetched_at: Instant::now(),
        });

        Ok((jwks, true))
    }
}

#[async_trait]
impl KeySetSource for RemoteJwks {
    async fn key_set(&self) -> Result<Arc<Jwks>, JwksError> {
        if self.cache_ttl.is_zero() {
            return Ok(Arc::new(self.fetch().await?));
        }

        if let Some(jwks) = self.cached_within(self.cache_ttl).await {
            return Ok(jwks);
        }

        let (jwks, _) = self.fetch_and_store(self.cache_ttl).await?;
        Ok(jwks)
    }

    async fn refresh(&self) -> Result<Option<Arc<Jwks>>, JwksError> {
        // Uncached sources already handed out a fresh set.
        if self.cache_ttl.is_zero() {
            return Ok(None);
        }

        let (jwks, fetched) = self.fetch_and_store(self.min_refresh_interval).await?;
        Ok(fetched.then_some(jwks))
    }
}
