//! HTTP server module
//!
//! Accepts connections on a tokio listener and serves each one on its own task
//! with hyper's HTTP/1 connection driver. Request bodies are read in full and
//! handed to the [`Router`].
//!
//! # Example
//!
//! ```no_run
//! use aad_gateway::{api, config::Config, server::Server};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let guard = Arc::new(config.auth.build_guard()?);
//! let server = Server::bind(&config.server, api::build_router(&config, guard)).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::ServerConfig;
use crate::router::{json_response, HttpResponse, Router};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Response header carrying the per-request id
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

/// HTTP server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Arc<Router>,
}

impl Server {
    /// Bind the configured address
    ///
    /// Port 0 asks the OS for a free port; see [`Server::local_addr`].
    pub async fn bind(config: &ServerConfig, router: Router) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            router: Arc::new(router),
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the process exits
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(futures::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Stops accepting new connections; connections already accepted run to
    /// completion on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Starting server on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let router = Arc::clone(&self.router);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| handle_request(req, Arc::clone(&router)));

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}

/// Read the body, dispatch, and stamp the request id
async fn handle_request(
    req: Request<Incoming>,
    router: Arc<Router>,
) -> Result<HttpResponse, Infallible> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let route = router.route_label(parts.uri.path()).to_string();

        let mut response = match body.collect().await {
            Ok(collected) => {
                router
                    .dispatch(Request::from_parts(parts, collected.to_bytes()))
                    .await
            }
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                json_response(StatusCode::BAD_REQUEST, &json!({ "message": "Bad Request" }))
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let status = response.status().as_u16();
        #[cfg(feature = "metrics")]
        crate::metrics::record_http_request(&route, status);
        info!(
            route = %route,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );

        Ok(response)
    }
    .instrument(span)
    .await
}
