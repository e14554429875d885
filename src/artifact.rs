//! Naming and disposal of the files a pipeline run creates.
//!
//! Every file is wrapped in a [TempArtifact] the moment its path is chosen.
//! Dropping the guard deletes the file, so every early return and every `?`
//! cleans up whatever the run created so far.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// File name suffix of finished backups.
pub const BACKUP_EXTENSION: &str = ".sql.gz";

/// A file owned by the running pipeline, deleted when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    armed: bool,
}

impl TempArtifact {
    /// Take ownership of `path`. The file doesn't have to exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now.
    pub fn remove(mut self) {
        self.armed = false;
        remove_best_effort(&self.path);
    }

    /// Give up ownership without deleting the file.
    pub fn persist(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.armed {
            remove_best_effort(&self.path);
        }
    }
}

/// Delete `path`, logging instead of failing.
///
/// A file that is already gone counts as deleted.
pub fn remove_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!(target: "pipeline::artifact", "Deleted {}", path.display());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::trace!(target: "pipeline::artifact", "Already gone: {}", path.display());
        }
        Err(e) => {
            log::warn!(target: "pipeline::artifact", "Failed to delete {}: {e}", path.display());
        }
    }
}

/// ISO-8601 timestamp with colons and dots removed, e.g. `2026-10-16T081502123Z`.
pub fn compact_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "")
}

/// Download name of a backup: `backup_<app>_<timestamp>.sql.gz`.
pub fn backup_file_name(app_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "backup_{app_name}_{}{BACKUP_EXTENSION}",
        compact_timestamp(now)
    )
}

/// A path in `dir` that no concurrent run will pick.
pub fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let suffix: u64 = rand::random();
    dir.join(format!("{stem}_{suffix:016x}{extension}"))
}
