//! Backup and restore pipelines.
//!
//! Both pipelines run their stages strictly one after the other. Each file a
//! stage creates is held in a [TempArtifact], so a failing stage returns its
//! error and the guards of all earlier stages delete their files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::artifact::{self, TempArtifact, BACKUP_EXTENSION};
use crate::compress::{self, Direction};
use crate::config::Config;
use crate::connection::ConnectionInfo;
use crate::dump;
use crate::error::PipelineError;
use crate::process::Outcome;
use crate::restore::{self, RestoreFormat};
use crate::sanitize;

/// A finished, compressed backup waiting to be delivered.
///
/// The file is deleted when the artifact is dropped.
#[derive(Debug)]
pub struct BackupArtifact {
    file: TempArtifact,
    file_name: String,
}

impl BackupArtifact {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name the backup is offered under, `backup_<app>_<timestamp>.sql.gz`.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn into_temp(self) -> TempArtifact {
        self.file
    }

    /// Move the backup into `dir` under its [file name](Self::file_name).
    pub fn persist_into(self, dir: &Path) -> Result<PathBuf, PipelineError> {
        let destination = dir.join(&self.file_name);
        if destination.exists() {
            return Err(PipelineError::Stream {
                stage: "store backup",
                source: io::Error::from(io::ErrorKind::AlreadyExists),
            });
        }

        match fs::rename(self.path(), &destination) {
            Ok(()) => {
                self.file.persist();
            }
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                if let Err(e) = fs::copy(self.path(), &destination) {
                    artifact::remove_best_effort(&destination);
                    return Err(PipelineError::Stream {
                        stage: "store backup",
                        source: e,
                    });
                }
                self.file.remove();
            }
            Err(e) => {
                return Err(PipelineError::Stream {
                    stage: "store backup",
                    source: e,
                })
            }
        }

        Ok(destination)
    }
}

/// Dump the database, compress the dump and return the compressed file.
pub fn backup(config: &Config, conn: &ConnectionInfo) -> Result<BackupArtifact, PipelineError> {
    let now = Utc::now();
    let dir = config.temp_dir();
    let file_name = artifact::backup_file_name(&config.app_name, now);
    let stem = format!("backup_{}_{}", config.app_name, artifact::compact_timestamp(now));
    log::info!(target: "pipeline::backup", "Creating backup {file_name}");

    let plain = TempArtifact::new(artifact::unique_path(&dir, &stem, ".sql"));
    dump::dump(&config.dump_tool, conn, plain.path())?;

    let compressed = TempArtifact::new(artifact::unique_path(&dir, &stem, BACKUP_EXTENSION));
    let dump_size = compress::transform(plain.path(), compressed.path(), Direction::Compress)?;
    plain.remove();

    let compressed_size = fs::metadata(compressed.path())
        .map_err(PipelineError::stream("inspect compressed backup"))?
        .len();
    log::info!(
        target: "pipeline::backup",
        "Backup {file_name} ready: {dump_size} bytes compressed to {compressed_size} bytes"
    );

    Ok(BackupArtifact {
        file: compressed,
        file_name,
    })
}

/// Result of a successful [restore](fn@restore).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub format: RestoreFormat,
    /// Statements removed by the sanitizer.
    pub removed_statements: usize,
    pub outcome: Outcome,
}

/// Restore the database from the script at `path`.
///
/// `original_name` decides the format. `path` itself is left alone, all
/// intermediate files are gone once this returns.
pub fn restore(
    config: &Config,
    conn: &ConnectionInfo,
    path: &Path,
    original_name: &str,
) -> Result<RestoreSummary, PipelineError> {
    let format = restore::validate_input(path, original_name)?;
    log::info!(target: "pipeline::restore", "Restoring from {original_name} ({format:?})");

    let dir = config.temp_dir();
    let stem = format!("restore_{}", artifact::compact_timestamp(Utc::now()));

    let decompressed = match format {
        RestoreFormat::SqlGz => {
            let decompressed = TempArtifact::new(artifact::unique_path(&dir, &stem, ".sql"));
            compress::transform(path, decompressed.path(), Direction::Decompress)?;
            Some(decompressed)
        }
        RestoreFormat::Sql => None,
    };
    let script = decompressed.as_ref().map_or(path, TempArtifact::path);

    let filtered = TempArtifact::new(artifact::unique_path(&dir, &stem, ".filtered.sql"));
    let report = sanitize::sanitize_file(script, filtered.path(), &config.sanitize.parameters)?;
    if let Some(decompressed) = decompressed {
        decompressed.remove();
    }

    let outcome = restore::restore(&config.restore_tool, conn, filtered.path())?;
    filtered.remove();

    Ok(RestoreSummary {
        format,
        removed_statements: report.removed,
        outcome,
    })
}
