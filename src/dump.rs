//! Plain SQL dumps of the connected database using `pg_dump`.

use std::path::Path;
use std::process::{Command, Stdio};

use crate::connection::ConnectionInfo;
use crate::error::PipelineError;
use crate::process::{self, Outcome};

/// stderr content of `pg_dump` that doesn't indicate a failed dump.
pub const BENIGN_MARKERS: &[&str] = &[
    "pg_dump: dumping",
    "pg_dump: reading",
    "pg_dump: saving",
    "NOTICE:",
    "pg_dump: warning: owner of",
];

/// Build the `pg_dump` invocation writing a plain SQL dump to `destination`.
///
/// The password is passed as `PGPASSWORD` so it never shows up in a process
/// listing.
pub fn dump_command(program: &Path, conn: &ConnectionInfo, destination: &Path) -> Command {
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
        .arg("--no-password") // never prompt
        .arg("--format=plain")
        .arg("--no-owner")
        .arg("--no-privileges")
        .arg(format!("--file={}", destination.display()))
        .env("PGPASSWORD", &conn.password)
        .stdin(Stdio::null());

    command
}

/// Dump the whole database to `destination`.
///
/// On failure `destination` may hold a partial dump, deleting it is up to
/// the caller.
pub fn dump(program: &Path, conn: &ConnectionInfo, destination: &Path) -> Result<Outcome, PipelineError> {
    let tool = process::tool_name(program);
    log::info!(
        target: "pipeline::dump",
        "Dumping database '{}' on {}:{}",
        conn.database,
        conn.host,
        conn.port
    );
    log::debug!(target: "pipeline::dump", "Writing dump to {}", destination.display());

    let result = process::run(dump_command(program, conn, destination))?;
    let outcome = process::check(&tool, result, BENIGN_MARKERS)?;

    log::info!(target: "pipeline::dump", "Finished database dump");
    Ok(outcome)
}
