//! HTTP router
//!
//! Exact-path route table dispatching fully-read requests to [`Handler`]s,
//! answering CORS preflights and producing 404/405 for everything else.

use bytes::Bytes;
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

mod cors;
mod handler;

pub use cors::{Cors, CorsPolicy, ALLOWED_HEADERS};
pub use handler::{json_response, text_response, Handler, HttpResponse};

/// Route label used for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

struct Route {
    method: Method,
    path: String,
    cors: Option<CorsPolicy>,
    handler: Arc<dyn Handler>,
}

/// Route table
///
/// # Example
///
/// ```
/// use aad_gateway::router::{text_response, Router};
/// use bytes::Bytes;
/// use hyper::{Method, Request, StatusCode};
///
/// let router = Router::new().route(Method::GET, "/ping", |_req: Request<Bytes>| async {
///     text_response(StatusCode::OK, "pong")
/// });
/// assert_eq!(router.route_label("/ping"), "/ping");
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` on `path`
    #[must_use]
    pub fn route<H: Handler>(mut self, method: Method, path: &str, handler: H) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            cors: None,
            handler: Arc::new(handler),
        });
        self
    }

    /// Register `handler` with CORS headers on its responses and preflight support
    #[must_use]
    pub fn cors_route<H: Handler>(
        mut self,
        method: Method,
        path: &str,
        policy: CorsPolicy,
        handler: H,
    ) -> Self {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            cors: Some(policy.clone()),
            handler: Arc::new(Cors::new(policy, handler)),
        });
        self
    }

    /// Metrics label for a request: the registered path, or [`UNMATCHED_ROUTE`]
    pub fn route_label(&self, path: &str) -> &str {
        self.routes
            .iter()
            .find(|r| r.path == path)
            .map(|r| r.path.as_str())
            .unwrap_or(UNMATCHED_ROUTE)
    }

    /// Dispatch a request to its handler
    pub async fn dispatch(&self, req: Request<Bytes>) -> HttpResponse {
        let path = req.uri().path();
        // HEAD is served by the GET handler; hyper drops the body.
        let method = if req.method() == Method::HEAD {
            &Method::GET
        } else {
            req.method()
        };

        if let Some(route) = self
            .routes
            .iter()
            .find(|r| r.path == path && r.method == method)
        {
            let handler = Arc::clone(&route.handler);
            return handler.call(req).await;
        }

        let on_path: Vec<&Route> = self.routes.iter().filter(|r| r.path == path).collect();
        if on_path.is_empty() {
            debug!(path, "No route");
            return json_response(StatusCode::NOT_FOUND, &json!({ "message": "Not Found" }));
        }

        let allowed = allowed_methods(&on_path);

        if req.method() == Method::OPTIONS {
            let mut response = text_response(StatusCode::OK, "");
            if let Ok(value) = HeaderValue::from_str(&allowed) {
                response.headers_mut().insert(ALLOW, value);
            }
            if let Some(policy) = on_path.iter().find_map(|r| r.cors.as_ref()) {
                policy.apply_preflight(&mut response, &allowed);
            }
            return response;
        }

        let mut response = json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "message": "Method Not Allowed" }),
        );
        if let Ok(value) = HeaderValue::from_str(&allowed) {
            response.headers_mut().insert(ALLOW, value);
        }
        response
    }
}

fn allowed_methods(routes: &[&Route]) -> String {
    let mut methods: Vec<&str> = routes.iter().map(|r| r.method.as_str()).collect();
    if methods.contains(&"GET") && !methods.contains(&"HEAD") {
        methods.push("HEAD");
    }
    methods.push("OPTIONS");
    methods.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN;

    fn router() -> Router {
        Router::new()
            .route(Method::GET, "/plain", |_req: Request<Bytes>| async {
                text_response(StatusCode::OK, "plain")
            })
            .cors_route(
                Method::GET,
                "/shared",
                CorsPolicy::default(),
                |_req: Request<Bytes>| async { text_response(StatusCode::OK, "shared") },
            )
    }

    fn request(method: Method, path: &str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_to_route() {
        let response = router().dispatch(request(Method::GET, "/plain")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_cors_route_has_headers() {
        let response = router().dispatch(request(Method::GET, "/shared")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = router().dispatch(request(Method::GET, "/nope")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let response = router().dispatch(request(Method::POST, "/plain")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn test_preflight() {
        let response = router().dispatch(request(Method::OPTIONS, "/shared")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            response.headers()[hyper::header::ACCESS_CONTROL_ALLOW_HEADERS],
            ALLOWED_HEADERS
        );
    }

    #[test]
    fn test_route_label() {
        let router = router();
        assert_eq!(router.route_label("/plain"), "/plain");
        assert_eq!(router.route_label("/x"), UNMATCHED_ROUTE);
    }
}
