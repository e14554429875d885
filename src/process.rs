//! Running the PostgreSQL client tools and judging their exit.
//!
//! Spawning and classification are kept apart so [classify] can be tested
//! against captured output without running anything.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Command;

use crate::error::PipelineError;

/// Captured result of an external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, `-1` if the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    /// stdout and stderr joined for error reports.
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Non-zero exit, but stderr only carried diagnostics known to be harmless.
    SuccessWithWarnings,
    Fatal,
}

/// stderr content that marks a line as a real failure, even if it also
/// contains a benign marker.
///
/// The client tools prefix their own errors with `<tool>: error:` and relay
/// server side connection failures as `FATAL:`.
pub const FATAL_MARKERS: &[&str] = &["error:", "FATAL:"];

/// Classify a [ProcessResult].
///
/// A non-zero exit is tolerated only if stderr has at least one non-blank
/// line and every non-blank line contains one of the `benign` markers and
/// none of the [FATAL_MARKERS].
pub fn classify(result: &ProcessResult, benign: &[&str]) -> Outcome {
    if result.exit_code == 0 {
        return Outcome::Success;
    }

    let mut lines = result
        .stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .peekable();

    if lines.peek().is_none() {
        return Outcome::Fatal;
    }

    if lines.all(|line| is_benign(line, benign)) {
        Outcome::SuccessWithWarnings
    } else {
        Outcome::Fatal
    }
}

fn is_benign(line: &str, benign: &[&str]) -> bool {
    !FATAL_MARKERS.iter().any(|marker| line.contains(marker))
        && benign.iter().any(|marker| line.contains(marker))
}

/// Display name of a tool, used in logs and errors.
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Run `command` to completion and capture its output.
///
/// A missing executable is reported as [PipelineError::ToolUnavailable].
pub fn run(mut command: Command) -> Result<ProcessResult, PipelineError> {
    let tool = tool_name(Path::new(command.get_program()));
    log::trace!(target: "pipeline::process", "Running: {} {}", tool, display_args(&command));

    let output = command.output().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PipelineError::ToolUnavailable {
                tool: tool.clone(),
                source,
            }
        } else {
            PipelineError::Spawn {
                tool: tool.clone(),
                source,
            }
        }
    })?;

    Ok(ProcessResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Turn a classified [ProcessResult] into the pipeline's result.
pub fn check(tool: &str, result: ProcessResult, benign: &[&str]) -> Result<Outcome, PipelineError> {
    let target = "pipeline::process";
    match classify(&result, benign) {
        Outcome::Success => {
            if !result.stderr.trim().is_empty() {
                log::debug!(target: target, "{tool}: {}", result.stderr.trim_end());
            }
            Ok(Outcome::Success)
        }
        Outcome::SuccessWithWarnings => {
            log::warn!(
                target: target,
                "{tool} exited with code {} but only reported warnings: {}",
                result.exit_code,
                result.stderr.trim_end()
            );
            Ok(Outcome::SuccessWithWarnings)
        }
        Outcome::Fatal => Err(PipelineError::ProcessExecution {
            tool: tool.to_string(),
            exit_code: result.exit_code,
            output: result.combined_output(),
        }),
    }
}

fn display_args(command: &Command) -> String {
    command
        .get_args()
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}
