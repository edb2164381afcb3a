//! HTTP trigger for handshakes.
//!
//! Provides:
//! - `POST /handshake` - run one handshake for `{"url": "..."}`
//! - `GET /health` - basic liveness check

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::orchestrator::Orchestrator;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub orchestrator: Arc<Orchestrator>,
    /// Daemon version.
    pub version: &'static str,
    /// Daemon start time.
    pub started_at: Instant,
}

#[derive(Debug, Deserialize)]
struct HandshakeRequest {
    url: String,
}

/// Create the HTTP router.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/handshake", post(handshake_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(state))
}

/// Handler for `POST /handshake`.
///
/// Every failure, including an unparsable body, maps to the same opaque 500;
/// the detail goes to the log only.
async fn handshake_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<HandshakeRequest>, axum::extract::rejection::JsonRejection>,
) -> impl IntoResponse {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected handshake request body");
            return internal_error();
        }
    };

    // A dropped connection must not stop a run between write and push.
    let orchestrator = Arc::clone(&state.orchestrator);
    let run = tokio::spawn(async move { orchestrator.handshake(&request.url).await });

    match run.await {
        Ok(Ok(actual_state)) => (StatusCode::OK, Json(actual_state)).into_response(),
        Ok(Err(_)) => internal_error(),
        Err(e) => {
            tracing::error!(error = %e, "handshake task aborted");
            internal_error()
        }
    }
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// Handler for `GET /health`.
async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": state.version,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(addr: std::net::SocketAddr, state: HttpState) -> std::io::Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "handshake trigger listening");
    axum::serve(listener, router).await
}
