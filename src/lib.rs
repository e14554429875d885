//! Backup and restore of a PostgreSQL database.
//!
//! Backups are taken with `pg_dump` as plain SQL, gzip compressed and
//! streamed to an HTTP client. Restores accept a `.sql` or `.sql.gz` file,
//! strip session settings the server may not know and replay the script
//! with `psql`, stopping at the first error.
//!
//! The [pipeline] module ties the stages together, [http] exposes them.
//! No file created along the way outlives the operation, see [artifact].

#![forbid(unsafe_code)]

pub mod artifact;
pub mod cli;
pub mod compress;
pub mod config;
pub mod connection;
pub mod dump;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod process;
pub mod restore;
pub mod sanitize;

pub use config::Config;
pub use connection::ConnectionInfo;
pub use error::PipelineError;
