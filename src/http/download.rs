//! Delivery of a finished backup as a file download.
//!
//! The backup file is owned by the response body. It is deleted once the
//! last byte is sent, when reading it fails mid-stream, or when the body is
//! dropped because the client went away.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::{error_response, run_blocking, AppState};
use crate::artifact::TempArtifact;
use crate::error::PipelineError;
use crate::pipeline::{self, BackupArtifact};

/// `GET /backup`
pub async fn download_backup(State(state): State<AppState>) -> Response {
    match create_backup(&state).await {
        Ok(artifact) => artifact_response(artifact).await,
        Err(e) => {
            log::error!(target: "http::download", "Backup failed: {e}");
            e.into_response()
        }
    }
}

async fn create_backup(state: &AppState) -> Result<BackupArtifact, PipelineError> {
    let conn = state.connection()?;
    let config = state.config.clone();
    run_blocking(move || pipeline::backup(&config, &conn)).await
}

/// Stream `artifact` to the client as an attachment.
///
/// Failures before the headers are built answer with a JSON error.
pub async fn artifact_response(artifact: BackupArtifact) -> Response {
    let file_name = artifact.file_name().to_string();

    let opened = async {
        let file = File::open(artifact.path()).await?;
        let len = file.metadata().await?.len();
        Ok::<_, io::Error>((file, len))
    }
    .await;
    let (file, len) = match opened {
        Ok(opened) => opened,
        Err(source) => {
            let e = PipelineError::Stream {
                stage: "open backup for download",
                source,
            };
            log::error!(target: "http::download", "{e}");
            return e.into_response();
        }
    };

    let body = DownloadStream::new(file, artifact.into_temp(), file_name.clone());
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/gzip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .header(header::CONTENT_LENGTH, len)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body));

    match response {
        Ok(response) => {
            log::info!(target: "http::download", "Sending {file_name} ({len} bytes)");
            response
        }
        Err(e) => {
            log::error!(target: "http::download", "Building download response failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send backup")
        }
    }
}

/// Body stream of a download that disposes of the backup file.
///
/// A read error ends the stream early instead of yielding the error, so the
/// client sees a truncated download.
pub struct DownloadStream {
    reader: ReaderStream<File>,
    artifact: Option<TempArtifact>,
    file_name: String,
    sent: u64,
}

impl DownloadStream {
    pub fn new(file: File, artifact: TempArtifact, file_name: String) -> Self {
        Self {
            reader: ReaderStream::new(file),
            artifact: Some(artifact),
            file_name,
            sent: 0,
        }
    }

    fn finish(&mut self) {
        if let Some(artifact) = self.artifact.take() {
            artifact.remove();
        }
    }
}

impl Stream for DownloadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.artifact.is_none() {
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.reader).poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                log::error!(
                    target: "http::download",
                    "Reading {} failed after {} bytes, truncating download: {e}",
                    this.file_name,
                    this.sent
                );
                this.finish();
                Poll::Ready(None)
            }
            None => {
                log::info!(
                    target: "http::download",
                    "Download of {} complete ({} bytes)",
                    this.file_name,
                    this.sent
                );
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for DownloadStream {
    fn drop(&mut self) {
        if self.artifact.is_some() {
            log::info!(
                target: "http::download",
                "Download of {} ended after {} bytes, client disconnected",
                self.file_name,
                self.sent
            );
            self.finish();
        }
    }
}
