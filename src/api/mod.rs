//! Demo API endpoints
//!
//! `/public` is open; `/api/user` and `/api/data` sit behind the
//! [`AuthGuard`]. All three carry CORS headers for browser clients.

use crate::auth::{require_auth, AuthContext, AuthGuard};
use crate::config::Config;
use crate::router::{json_response, CorsPolicy, HttpResponse, Router};
use bytes::Bytes;
use hyper::{Method, Request, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Entry of the demo data set
#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub id: u32,
    pub name: &'static str,
    pub age: u32,
}

pub const PEOPLE: [Person; 4] = [
    Person { id: 1, name: "Josh", age: 47 },
    Person { id: 2, name: "Adam", age: 45 },
    Person { id: 3, name: "Fred", age: 33 },
    Person { id: 4, name: "Danny", age: 53 },
];

/// Route table for the gateway
pub fn build_router(config: &Config, guard: Arc<AuthGuard>) -> Router {
    let cors = CorsPolicy::new(&config.cors.allow_origin);

    let router = Router::new()
        .cors_route(Method::GET, "/public", cors.clone(), public)
        .cors_route(
            Method::GET,
            "/api/user",
            cors.clone(),
            require_auth(Arc::clone(&guard), user),
        )
        .cors_route(Method::GET, "/api/data", cors, require_auth(guard, data))
        .route(Method::GET, "/health", health);

    #[cfg(feature = "metrics")]
    let router = if config.metrics.enabled {
        router.route(Method::GET, "/metrics", metrics)
    } else {
        router
    };

    router
}

/// Open to everyone
pub async fn public(_req: Request<Bytes>) -> HttpResponse {
    json_response(
        StatusCode::OK,
        &json!({ "message": "Public endpoint - open to all" }),
    )
}

/// Echo the caller's verified claims
pub async fn user(req: Request<Bytes>) -> HttpResponse {
    match AuthContext::from_request(&req) {
        Some(ctx) => json_response(StatusCode::OK, &json!({ "message": ctx.claims })),
        None => {
            // Only reachable if mounted without the guard.
            error!("/api/user served without an authentication context");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "message": "Internal Server Error" }),
            )
        }
    }
}

pub async fn data(_req: Request<Bytes>) -> HttpResponse {
    json_response(StatusCode::OK, &json!({ "people": PEOPLE }))
}

pub async fn health(_req: Request<Bytes>) -> HttpResponse {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

/// Prometheus text exposition
#[cfg(feature = "metrics")]
pub async fn metrics(_req: Request<Bytes>) -> HttpResponse {
    use crate::router::text_response;
    use http_body_util::Full;
    use hyper::header::CONTENT_TYPE;
    use hyper::Response;

    match crate::metrics::gather_text() {
        Ok((content_type, body)) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(body)))
            .unwrap_or_else(|e| {
                error!("Failed to build metrics response: {}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}
