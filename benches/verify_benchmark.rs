//! Token verification benchmarks

use aad_gateway::auth::{
    extract_bearer_token, AuthGuard, BearerToken, Jwks, StaticJwks, TokenVerifier,
};
use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;

const SIGNING_KEY: &str = include_str!("../tests/fixtures/signing_key.pem");
const JWKS: &str = include_str!("../tests/fixtures/jwks.json");

fn token() -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());
    let claims = json!({
        "aud": "api://bench",
        "iss": "https://sts.windows.net/bench/",
        "sub": "user123",
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    });
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap(),
    )
    .unwrap()
}

fn benchmark_extract(c: &mut Criterion) {
    let header = format!("Bearer {}", token());

    c.bench_function("extract_bearer_token", |b| {
        b.iter(|| extract_bearer_token(black_box(Some(header.as_str()))))
    });
}

fn benchmark_verify(c: &mut Criterion) {
    let verifier = TokenVerifier::for_tenant("bench", "api://bench");
    let jwks = Jwks::from_json(JWKS).unwrap();
    let token = BearerToken::new(token());

    c.bench_function("verify_rs256", |b| {
        b.iter(|| verifier.verify(black_box(&token), black_box(&jwks)))
    });
}

fn benchmark_guard(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let guard = AuthGuard::new(
        TokenVerifier::for_tenant("bench", "api://bench"),
        Arc::new(StaticJwks::from_json(JWKS).unwrap()),
    );
    let header = format!("Bearer {}", token());

    c.bench_function("guard_authenticate", |b| {
        b.to_async(&runtime)
            .iter(|| guard.authenticate(black_box(Some(header.as_str()))))
    });
}

criterion_group!(benches, benchmark_extract, benchmark_verify, benchmark_guard);
criterion_main!(benches);
