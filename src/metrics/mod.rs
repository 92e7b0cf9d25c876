//! Metrics module
//!
//! Prometheus counters and histograms for requests, authentication outcomes
//! and JWKS fetches, exposed in text format on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Encoder, Histogram, TextEncoder,
};

lazy_static! {
    // Request metrics
    pub static ref HTTP_REQUESTS: CounterVec = register_counter_vec!(
        "aad_gateway_http_requests_total",
        "Total HTTP requests",
        &["route", "status"]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "aad_gateway_auth_attempts_total",
        "Authentication attempts by outcome",
        &["outcome"]  // "success" or an error code
    ).unwrap();

    // JWKS metrics
    pub static ref JWKS_FETCHES: CounterVec = register_counter_vec!(
        "aad_gateway_jwks_fetches_total",
        "JWKS fetches from the authority",
        &["status"]
    ).unwrap();

    pub static ref JWKS_FETCH_DURATION: Histogram = register_histogram!(
        "aad_gateway_jwks_fetch_duration_seconds",
        "JWKS fetch duration in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();
}

/// Record a served request
pub fn record_http_request(route: &str, status: u16) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[route, status.as_str()])
        .inc();
}

/// Record an authentication attempt
///
/// `outcome` is `"success"` or the error code returned to the client.
pub fn record_auth_attempt(outcome: &str) {
    AUTH_ATTEMPTS.with_label_values(&[outcome]).inc();
}

/// Record a JWKS fetch
pub fn record_jwks_fetch(status: &str, duration_secs: f64) {
    JWKS_FETCHES.with_label_values(&[status]).inc();
    JWKS_FETCH_DURATION.observe(duration_secs);
}

/// Encode the default registry in Prometheus text format
pub fn gather_text() -> Result<(String, String), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;

    let body = String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {}", e)))?;
    Ok((encoder.format_type().to_string(), body))
}
