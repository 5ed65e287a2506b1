//! HTTP front end for cluster detection
//!
//! Exposes the detector as a single JSON request/response operation that
//! browsers may call from any origin.

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::cluster::types::{Cluster, DetectionOutcome};
use crate::cluster::ClusterDetector;
use crate::error::Error;

/// Path the hosted functions runtime uses for this operation
pub const FUNCTION_PATH: &str = "/functions/v1/detect-wallet-clusters";

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Client-Info, Apikey";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8787
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    #[serde(default)]
    token_id: Value,
}

impl DetectRequest {
    /// Token id as a string. Numeric ids are accepted; zero, blanks and
    /// non-scalar values are not.
    fn token_id(&self) -> Option<String> {
        match &self.token_id {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct DetectResponse<'a> {
    success: bool,
    clusters_detected: usize,
    clusters: &'a [Cluster],
}

/// Build the router
pub fn router(detector: Arc<ClusterDetector>) -> Router {
    Router::new()
        .route("/", post(detect_clusters).options(preflight))
        .route(FUNCTION_PATH, post(detect_clusters).options(preflight))
        .route("/health", get(health))
        .layer(middleware::from_fn(cors_headers))
        .with_state(detector)
}

/// Serve until ctrl-c
pub async fn serve(config: &ServerConfig, detector: Arc<ClusterDetector>) -> crate::Result<()> {
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Io(format!("Failed to bind {}: {}", addr, e)))?;
    info!(addr = %addr, "Cluster detection service listening");

    serve_on(listener, detector, shutdown_signal()).await
}

/// Serve on an already-bound listener
pub async fn serve_on<F>(
    listener: TcpListener,
    detector: Arc<ClusterDetector>,
    shutdown: F,
) -> crate::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(detector))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health() -> &'static str {
    "OK"
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

async fn detect_clusters(State(detector): State<Arc<ClusterDetector>>, body: Bytes) -> Response {
    let request: DetectRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return error_response(Error::Deserialization(e.to_string())),
    };

    let token_id = match request.token_id() {
        Some(id) => id,
        None => return error_response(Error::InvalidRequest("token_id is required".to_string())),
    };

    match detector.detect(&token_id).await {
        Ok(DetectionOutcome::NoTransactions) => (
            StatusCode::OK,
            Json(json!({ "clusters": [], "message": "No transactions found" })),
        )
            .into_response(),
        Ok(outcome) => {
            let clusters = outcome.clusters();
            (
                StatusCode::OK,
                Json(DetectResponse {
                    success: true,
                    clusters_detected: clusters.len(),
                    clusters,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

fn error_response(e: Error) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Error detecting clusters: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
