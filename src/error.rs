//! Errors raised by the backup and restore pipelines.

use std::io;
use std::path::PathBuf;

use derive_more::{Display, Error, From};

/// The database connection could not be configured.
#[derive(Debug, Display, Error)]
pub enum ConfigurationError {
    /// No connection URL was supplied.
    #[display("No database connection URL configured (set DATABASE_URL)")]
    MissingDatabaseUrl,
    /// The connection URL is not a valid URL.
    #[display("Database connection URL is invalid: {_0}")]
    InvalidUrl(url::ParseError),
    /// The connection URL does not point to a PostgreSQL server.
    #[display("Unsupported database URL scheme: {_0}")]
    UnsupportedScheme(#[error(ignore)] String),
    /// A component of the connection URL is missing or empty.
    #[display("Database connection URL has no {_0}")]
    MissingComponent(#[error(ignore)] &'static str),
}

/// A file offered for restore was rejected before any work was done.
#[derive(Debug, Display, Error)]
pub enum ValidationError {
    /// The file name has neither a `.sql` nor a `.sql.gz` extension.
    #[display("Unsupported backup format '{_0}', expected a .sql or .sql.gz file")]
    UnsupportedFormat(#[error(ignore)] String),
    /// The file to restore does not exist.
    #[display("Backup file not found: {}", _0.display())]
    MissingFile(#[error(ignore)] PathBuf),
}

/// Errors of the backup and restore pipelines.
#[derive(Debug, Display, Error, From)]
pub enum PipelineError {
    /// Missing or unusable connection configuration.
    #[from]
    #[display("{_0}")]
    Configuration(ConfigurationError),

    /// The dump or restore executable isn't installed.
    #[display("Required tool '{tool}' is not available: install the PostgreSQL client tools and make sure '{tool}' is on PATH")]
    ToolUnavailable {
        tool: String,
        source: io::Error,
    },

    /// The executable ran but reported a real failure.
    #[display("'{tool}' exited with code {exit_code}: {output}")]
    ProcessExecution {
        tool: String,
        exit_code: i32,
        output: String,
    },

    /// The executable couldn't be started for a reason other than it missing.
    #[display("Failed to run '{tool}': {source}")]
    Spawn { tool: String, source: io::Error },

    /// Input rejected before processing.
    #[from]
    #[display("{_0}")]
    Validation(ValidationError),

    /// Reading, writing or transforming a file failed mid-pipeline.
    #[display("Failed to {stage}: {source}")]
    Stream {
        stage: &'static str,
        source: io::Error,
    },

    /// The blocking task running the pipeline died.
    #[display("Pipeline task failed: {_0}")]
    Task(#[error(ignore)] String),
}

impl PipelineError {
    pub(crate) fn stream(stage: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Stream { stage, source }
    }

    /// HTTP status code the error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            _ => 500,
        }
    }
}
