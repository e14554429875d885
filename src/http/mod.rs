//! HTTP surface of the backup service.
//!
//! - `GET /backup` streams a fresh compressed backup, see [download].
//! - `POST /restore?filename=<name>` restores from the uploaded request body, see [upload].
//! - `GET /health` for liveness checks.
//!
//! The pipelines block on child processes and file copies and therefore run
//! on tokio's blocking thread pool.

pub mod download;
pub mod upload;

use std::io;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::connection::ConnectionInfo;
use crate::error::PipelineError;

/// Shared state of all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    database_url: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: Config, database_url: Option<String>) -> Self {
        Self {
            config: Arc::new(config),
            database_url: database_url.map(Arc::from),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Connection parameters for a single operation.
    fn connection(&self) -> Result<ConnectionInfo, PipelineError> {
        Ok(ConnectionInfo::from_optional(self.database_url.as_deref())?)
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, &self.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Run a pipeline on the blocking thread pool.
async fn run_blocking<T, F>(pipeline: F) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(pipeline)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
}

/// Reject requests without the configured admin bearer token.
async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.http.admin_token.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    if provided.is_some_and(|token| token_matches(token, expected)) {
        next.run(request).await
    } else {
        log::warn!(target: "http", "Rejected unauthenticated request to {}", request.uri().path());
        error_response(StatusCode::UNAUTHORIZED, "Administrator token required")
    }
}

/// Token of an `Authorization: Bearer <token>` header value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim_start())
}

/// Compare without leaking the length of the common prefix through timing.
fn token_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the router serving all routes.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/backup", get(download::download_backup))
        .route("/restore", post(upload::restore_upload))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .merge(admin)
        .with_state(state)
}

/// Serve on the configured address until Ctrl-C.
pub async fn serve(state: AppState) -> io::Result<()> {
    let addr = state.config.http.bind;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!(target: "http", "Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!(target: "http", "Listening for Ctrl-C failed: {e}");
        std::future::pending::<()>().await;
    }
    log::info!(target: "http", "Shutting down");
}
