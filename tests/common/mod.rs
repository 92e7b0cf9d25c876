//! Shared test infrastructure
//!
//! RSA fixtures, token minting and a gateway running against a stubbed
//! identity provider.

#![allow(dead_code)]

use aad_gateway::config::Config;
use aad_gateway::{api, Server};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing_key.pem");
pub const FOREIGN_KEY: &str = include_str!("../fixtures/foreign_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");
pub const FOREIGN_JWKS: &str = include_str!("../fixtures/foreign_jwks.json");

pub const KID: &str = "test-key-1";
pub const FOREIGN_KID: &str = "foreign-key";
pub const TENANT: &str = "test-tenant";
pub const AUDIENCE: &str = "api://test-audience";

pub fn issuer() -> String {
    format!("https://sts.windows.net/{}/", TENANT)
}

pub fn jwks_path() -> String {
    format!("/{}/discovery/v2.0/keys", TENANT)
}

/// Claims of a token that passes every check
pub fn valid_claims() -> Value {
    json!({
        "aud": AUDIENCE,
        "iss": issuer(),
        "sub": "user123",
        "name": "Test User",
        "scope": "read write",
        "iat": Utc::now().timestamp(),
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    })
}

/// Same as [`valid_claims`] with `field` replaced
pub fn claims_with(field: &str, value: Value) -> Value {
    let mut claims = valid_claims();
    claims[field] = value;
    claims
}

/// Sign `claims` with the fixture key under `kid`
pub fn mint(claims: &Value, kid: Option<&str>) -> String {
    mint_with_key(claims, kid, SIGNING_KEY)
}

pub fn mint_with_key(claims: &Value, kid: Option<&str>, pem: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    encode(
        &header,
        claims,
        &EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap(),
    )
    .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Stubbed identity provider serving `jwks`
pub async fn mock_authority(jwks: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(jwks.to_string(), "application/json"))
        .mount(&server)
        .await;
    server
}

/// Configuration pointing at `authority`, bound to a free port
pub fn test_config(authority: &str) -> Config {
    let mut config = Config::default();
    config.server.address = "127.0.0.1:0".into();
    config.auth.tenant_id = TENANT.into();
    config.auth.audience = AUDIENCE.into();
    config.auth.jwks.authority = authority.into();
    config
}

/// Gateway running on its own task
pub struct TestGateway {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestGateway {
    pub async fn start(config: Config) -> Self {
        let guard = Arc::new(config.auth.build_guard().unwrap());
        let server = Server::bind(&config.server, api::build_router(&config, guard))
            .await
            .unwrap();
        let addr = server.local_addr();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = server
                .run_until(async {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
