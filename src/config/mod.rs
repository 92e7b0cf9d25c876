//! Configuration module for the AAD gateway
//!
//! Handles loading of YAML configuration files with `${VAR}` expansion, the
//! hosting environment's overrides (`AUDIENCES`, `AAD_TENANT_NAME`,
//! `FUNCTIONS_CUSTOMHANDLER_PORT`) and validation.

use crate::auth::{jwks, tenant_issuer, AuthGuard, JwksError, RemoteJwks, TokenVerifier};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Audience override, as set by the hosting environment
pub const AUDIENCES_VAR: &str = "AUDIENCES";
/// Tenant override
pub const TENANT_VAR: &str = "AAD_TENANT_NAME";
/// Port override; binds `0.0.0.0:<port>`
pub const PORT_VAR: &str = "FUNCTIONS_CUSTOMHANDLER_PORT";
/// Prefix for structured overrides such as `AAD_GATEWAY__AUTH__LEEWAY_SECS`
pub const ENV_PREFIX: &str = "AAD_GATEWAY";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Failed to read environment: {0}")]
    EnvError(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Build configuration from defaults and the environment alone
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config: Config = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Config::default())?)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply the hosting environment's variables on top of this config
    pub fn apply_env_overrides(&mut self) {
        if let Some(audience) = non_empty_var(AUDIENCES_VAR) {
            self.auth.audience = audience;
        }
        if let Some(tenant) = non_empty_var(TENANT_VAR) {
            self.auth.tenant_id = tenant;
        }
        if let Some(port) = non_empty_var(PORT_VAR) {
            self.server.address = format!("0.0.0.0:{}", port);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.tenant_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "auth.tenant_id is required (or set {})",
                TENANT_VAR
            )));
        }

        if self.auth.audience.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "auth.audience is required (or set {})",
                AUDIENCES_VAR
            )));
        }

        for (field, value) in [
            ("auth.tenant_id", &self.auth.tenant_id),
            ("auth.audience", &self.auth.audience),
        ] {
            if let Some(var) = unresolved_placeholder(value) {
                return Err(ConfigError::ValidationError(format!(
                    "{} references unset environment variable {}",
                    field, var
                )));
            }
        }

        self.server.socket_addr()?;

        if !is_valid_http_url(&self.auth.jwks.authority) {
            return Err(ConfigError::ValidationError(
                "Invalid JWKS authority: must start with http:// or https://".into(),
            ));
        }

        if self.auth.jwks.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "auth.jwks.timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Name of the first `${VAR}` left unexpanded in `value`
fn unresolved_placeholder(value: &str) -> Option<&str> {
    let start = value.find("${")? + 2;
    let rest = &value[start..];
    let end = rest.find(|c| c == '}' || c == ':').unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "Invalid server address '{}': expected host:port",
                self.address
            ))
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:5000".to_string()
}

/// Token validation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Azure AD tenant id or name
    #[serde(default)]
    pub tenant_id: String,

    /// Expected `aud` claim
    #[serde(default)]
    pub audience: String,

    /// Clock skew tolerated on `exp`/`nbf`
    #[serde(default)]
    pub leeway_secs: u64,

    #[serde(default)]
    pub jwks: JwksConfig,
}

impl AuthConfig {
    /// Expected `iss` claim for the tenant
    pub fn issuer(&self) -> String {
        tenant_issuer(&self.tenant_id)
    }

    /// Discovery URL of the tenant's signing keys
    pub fn jwks_url(&self) -> String {
        jwks::jwks_url(&self.jwks.authority, &self.tenant_id)
    }

    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(&self.audience, &self.issuer()).with_leeway(self.leeway_secs)
    }

    /// Guard backed by the tenant's remote key set
    pub fn build_guard(&self) -> Result<AuthGuard, JwksError> {
        let keys = RemoteJwks::new(self.jwks_url(), Duration::from_secs(self.jwks.timeout_secs))?
            .with_cache_ttl(Duration::from_secs(self.jwks.cache_ttl_secs))
            .with_min_refresh_interval(Duration::from_secs(self.jwks.min_refresh_interval_secs));

        Ok(AuthGuard::new(self.verifier(), Arc::new(keys)))
    }
}

/// Key set retrieval settings
///
/// `cache_ttl_secs: 0` fetches the key set on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksConfig {
    #[serde(default = "default_authority")]
    pub authority: String,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_min_refresh_interval")]
    pub min_refresh_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            cache_ttl_secs: default_cache_ttl(),
            min_refresh_interval_secs: default_min_refresh_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_authority() -> String {
    jwks::DEFAULT_AUTHORITY.to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_min_refresh_interval() -> u64 {
    30
}

fn default_timeout() -> u64 {
    5
}

/// Cross-origin settings for the demo routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
        }
    }
}

fn default_allow_origin() -> String {
    "*".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
