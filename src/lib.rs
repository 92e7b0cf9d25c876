//! AAD Gateway Library
//!
//! Minimal HTTP API gateway that admits requests only when they carry a valid
//! Azure AD bearer token.
//!
//! # Features
//!
//! - **JWKS Verification**: RS256 signatures checked against the tenant's published keys
//! - **Key Caching**: Key set cached with a TTL and refreshed once on key rotation
//! - **Claim Checks**: Issuer, audience and expiry enforced on every request
//! - **Uniform Errors**: Every rejection is a 401 with a `{code, description}` body
//!
//! # Example
//!
//! ```no_run
//! use aad_gateway::{api, config::Config, server::Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let guard = Arc::new(config.auth.build_guard()?);
//!     let server = Server::bind(&config.server, api::build_router(&config, guard)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod router;
pub mod server;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::server::Server;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
