//! Removal of session settings the restore target may not know.
//!
//! Dumps taken by a newer `pg_dump` set parameters such as
//! `transaction_timeout` which older or managed servers reject, aborting the
//! whole restore. Lines that set a denylisted parameter are dropped, all
//! other lines are kept byte for byte.
//!
//! This is a line filter, not a SQL parser: a statement spread over several
//! lines or a string literal that mentions a denylisted name is matched by
//! its lines alone.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::error::PipelineError;

/// Parameters removed unless configured otherwise.
pub const DEFAULT_DENYLIST: &[&str] = &["transaction_timeout", "idle_in_transaction_session_timeout"];

static SETTING_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)^\s*(set\s|select\s+(pg_catalog\.)?set_config\s*\()")
        .expect("setting statement regex should be valid")
});

/// Outcome of [sanitize_file].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SanitizeReport {
    pub kept: usize,
    pub removed: usize,
}

/// Whether `line` sets one of the `denylist` parameters.
pub fn is_denied(line: &[u8], denylist: &[String]) -> bool {
    if !SETTING_STATEMENT.is_match(line) {
        return false;
    }

    let lower = line.to_ascii_lowercase();
    denylist.iter().any(|param| {
        let param = param.to_ascii_lowercase();
        !param.is_empty() && lower.windows(param.len()).any(|window| window == param.as_bytes())
    })
}

/// Filter a whole script held in memory.
pub fn sanitize(script: &[u8], denylist: &[String]) -> (Vec<u8>, SanitizeReport) {
    let mut filtered = Vec::with_capacity(script.len());
    let mut report = SanitizeReport::default();

    for line in script.split_inclusive(|byte| *byte == b'\n') {
        if is_denied(line, denylist) {
            log::debug!(
                target: "pipeline::sanitize",
                "Dropping: {}",
                String::from_utf8_lossy(line).trim_end()
            );
            report.removed += 1;
        } else {
            filtered.extend_from_slice(line);
            report.kept += 1;
        }
    }

    (filtered, report)
}

/// Read `source`, filter it and write the result to `destination`.
pub fn sanitize_file(
    source: &Path,
    destination: &Path,
    denylist: &[String],
) -> Result<SanitizeReport, PipelineError> {
    let script = fs::read(source).map_err(PipelineError::stream("read SQL script"))?;
    let (filtered, report) = sanitize(&script, denylist);
    fs::write(destination, filtered).map_err(PipelineError::stream("write sanitized SQL script"))?;

    log::info!(
        target: "pipeline::sanitize",
        "Sanitized SQL script: {} statements removed, {} lines kept",
        report.removed,
        report.kept
    );

    Ok(report)
}
