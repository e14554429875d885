//! Replaying SQL scripts into the connected database using `psql`.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::connection::ConnectionInfo;
use crate::error::{PipelineError, ValidationError};
use crate::process::{self, Outcome};

/// stderr content of `psql` that doesn't indicate a failed restore.
pub const BENIGN_MARKERS: &[&str] = &[
    "NOTICE:",
    "already exists",
    "unrecognized configuration parameter",
];

/// Accepted formats of restore input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreFormat {
    /// Plain SQL script.
    Sql,
    /// Gzip compressed SQL script.
    SqlGz,
}

impl RestoreFormat {
    /// Detect the format from a file name, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".sql.gz") {
            Some(Self::SqlGz)
        } else if name.ends_with(".sql") {
            Some(Self::Sql)
        } else {
            None
        }
    }
}

/// Whether `name` is a `.sql` or `.sql.gz` file.
pub fn is_valid_restore_format(name: &str) -> bool {
    RestoreFormat::from_file_name(name).is_some()
}

/// Check a restore input before any work is done on it.
pub fn validate_input(path: &Path, original_name: &str) -> Result<RestoreFormat, ValidationError> {
    let format = RestoreFormat::from_file_name(original_name)
        .ok_or_else(|| ValidationError::UnsupportedFormat(original_name.to_string()))?;
    if !path.is_file() {
        return Err(ValidationError::MissingFile(path.to_path_buf()));
    }

    Ok(format)
}

/// Build the `psql` invocation that stops at the first failing statement.
///
/// The script itself is attached as stdin by [restore].
pub fn restore_command(program: &Path, conn: &ConnectionInfo) -> Command {
    let mut command = Command::new(program);
    command
        .arg("--host")
        .arg(&conn.host)
        .arg("--port")
        .arg(&conn.port)
        .arg("--username")
        .arg(&conn.username)
        .arg("--dbname")
        .arg(&conn.database)
        .arg("--no-password")
        .arg("--no-psqlrc")
        .arg("--quiet")
        .arg("--set=ON_ERROR_STOP=1")
        .env("PGPASSWORD", &conn.password);

    command
}

/// Replay the SQL script at `script` into the database.
pub fn restore(program: &Path, conn: &ConnectionInfo, script: &Path) -> Result<Outcome, PipelineError> {
    let tool = process::tool_name(program);
    log::info!(
        target: "pipeline::restore",
        "Restoring database '{}' on {}:{} from {}",
        conn.database,
        conn.host,
        conn.port,
        script.display()
    );

    let input = File::open(script).map_err(PipelineError::stream("open SQL script for restore"))?;
    let mut command = restore_command(program, conn);
    command.stdin(Stdio::from(input));

    let result = process::run(command)?;
    let outcome = process::check(&tool, result, BENIGN_MARKERS)?;

    log::info!(target: "pipeline::restore", "Finished database restore");
    Ok(outcome)
}
