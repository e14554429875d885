//! Restore from an uploaded backup.
//!
//! The request body is stored in the temp directory first, standing in for
//! a multipart upload middleware. The restore handler then owns the stored
//! file and deletes it once done, whatever the outcome.

use std::io;
use std::path::Path;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

use super::{run_blocking, AppState};
use crate::artifact::{self, TempArtifact};
use crate::error::{PipelineError, ValidationError};
use crate::pipeline::{self, RestoreSummary};
use crate::restore::is_valid_restore_format;

/// A client supplied file stored on local disk.
#[derive(Debug)]
pub struct UploadedArtifact {
    pub file: TempArtifact,
    pub original_name: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct RestoreParams {
    /// Name of the file on the client.
    #[serde(default)]
    pub filename: String,
}

/// Store `body` as a new file in `dir`.
pub async fn receive_upload(
    dir: &Path,
    original_name: &str,
    body: Body,
) -> Result<UploadedArtifact, PipelineError> {
    let file = TempArtifact::new(artifact::unique_path(dir, "upload", ".part"));
    let mut output = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(file.path())
        .await
        .map_err(PipelineError::stream("store upload"))?;

    let mut reader = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let size = tokio::io::copy(&mut reader, &mut output)
        .await
        .map_err(PipelineError::stream("receive upload"))?;
    output
        .flush()
        .await
        .map_err(PipelineError::stream("store upload"))?;

    log::debug!(
        target: "http::restore",
        "Stored upload {original_name} ({size} bytes) at {}",
        file.path().display()
    );

    Ok(UploadedArtifact {
        file,
        original_name: original_name.to_string(),
    })
}

/// `POST /restore?filename=<name>`
pub async fn restore_upload(
    State(state): State<AppState>,
    Query(params): Query<RestoreParams>,
    body: Body,
) -> Response {
    match receive_upload(&state.config.temp_dir(), &params.filename, body).await {
        Ok(upload) => restore_uploaded(&state, upload).await,
        Err(e) => {
            log::error!(target: "http::restore", "Receiving upload failed: {e}");
            e.into_response()
        }
    }
}

/// Restore from an upload and delete the uploaded file afterwards.
pub async fn restore_uploaded(state: &AppState, upload: UploadedArtifact) -> Response {
    let UploadedArtifact {
        file,
        original_name,
    } = upload;

    if !is_valid_restore_format(&original_name) {
        file.remove();
        let e = PipelineError::from(ValidationError::UnsupportedFormat(original_name));
        log::warn!(target: "http::restore", "{e}");
        return e.into_response();
    }

    let restored = run_restore(state, file.path(), &original_name).await;
    file.remove();

    match restored {
        Ok(summary) => {
            log::info!(
                target: "http::restore",
                "Restored database from {original_name} ({} statements sanitized, {:?})",
                summary.removed_statements,
                summary.outcome
            );
            Json(json!({ "message": format!("Database restored from {original_name}") })).into_response()
        }
        Err(e) => {
            log::error!(target: "http::restore", "Restore from {original_name} failed: {e}");
            e.into_response()
        }
    }
}

async fn run_restore(
    state: &AppState,
    path: &Path,
    original_name: &str,
) -> Result<RestoreSummary, PipelineError> {
    let conn = state.connection()?;
    let config = state.config.clone();
    let path = path.to_path_buf();
    let name = original_name.to_string();
    run_blocking(move || pipeline::restore(&config, &conn, &path, &name)).await
}
