//! Outcome classification.
//!
//! [`classify`] is a pure function from a [`RunReport`] to an
//! [`OutcomeRecord`]. Precedence, highest first:
//!
//! | Observation                                   | Outcome                         |
//! |-----------------------------------------------|---------------------------------|
//! | runner timed out                              | `timeout`                       |
//! | no result file, exit 0                        | `no_result`                     |
//! | no result file, exit non-zero                 | `Err(CoreError::ProcessFailed)` |
//! | result file too large or not a result doc     | `json_decode_error`             |
//! | result doc with `success: true`               | success, payload = `result`     |
//! | result doc with `success: false`              | embedded kind (+ exit code)     |
//!
//! The exit code alone never decides success.

use serde::Deserialize;
use serde_json::Value;

use super::outcome::{Diagnostics, ErrorKind, OutcomeRecord};
use super::subprocess::{RunReport, SideChannel, Termination, MAX_RESULT_BYTES};
use crate::error::CoreError;

/// Tracebacks longer than this keep only their last bytes.
pub const MAX_TRACEBACK_BYTES: usize = 16 * 1024;

const TRUNCATION_MARKER: &str = "[traceback truncated]\n...\n";

/// Shape of the document the wrapper writes to the side channel.
#[derive(Debug, Deserialize)]
struct SideChannelDocument {
    success: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    traceback: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
    #[serde(default)]
    available_functions: Option<Vec<String>>,
}

/// Turn raw run observations into the canonical outcome.
///
/// Returns `Err` only when the process died without leaving a result and
/// with a non-zero status: nothing the script did can be reported, so the
/// caller must treat it as a system failure.
pub fn classify(report: RunReport) -> Result<OutcomeRecord, CoreError> {
    let RunReport {
        termination,
        stdout,
        stderr,
        side_channel,
        duration_ms,
    } = report;

    let timing = Diagnostics {
        duration_ms: Some(duration_ms),
        ..Diagnostics::default()
    };

    let exit_code = match termination {
        Termination::TimedOut => {
            return Ok(OutcomeRecord::failure(
                ErrorKind::Timeout,
                format!("Script execution timed out after {duration_ms}ms"),
            )
            .with_streams(stdout, stderr)
            .with_diagnostics(timing));
        }
        other => other.exit_code().unwrap_or(-1),
    };
    let failed_exit = (exit_code != 0).then_some(exit_code);

    let bytes = match side_channel {
        SideChannel::Missing if exit_code == 0 => {
            return Ok(OutcomeRecord::failure(
                ErrorKind::NoResult,
                "Script exited without producing a result",
            )
            .with_streams(stdout, stderr)
            .with_diagnostics(timing));
        }
        SideChannel::Missing => {
            return Err(CoreError::ProcessFailed { exit_code, stderr });
        }
        SideChannel::Oversized => {
            return Ok(OutcomeRecord::failure(
                ErrorKind::JsonDecodeError,
                format!("Result file exceeds {MAX_RESULT_BYTES} bytes"),
            )
            .with_streams(stdout, stderr)
            .with_diagnostics(Diagnostics {
                exit_code: failed_exit,
                ..timing
            }));
        }
        SideChannel::Present(bytes) => bytes,
    };

    let doc: SideChannelDocument = match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            return Ok(OutcomeRecord::failure(
                ErrorKind::JsonDecodeError,
                format!("Malformed result file: {e}"),
            )
            .with_streams(stdout, stderr)
            .with_diagnostics(Diagnostics {
                exit_code: failed_exit,
                ..timing
            }));
        }
    };

    if doc.success {
        return Ok(OutcomeRecord::success(doc.result)
            .with_streams(stdout, stderr)
            .with_diagnostics(timing));
    }

    let (kind, message) = match doc.error.as_deref().map(|raw| (raw, ErrorKind::from_wrapper(raw))) {
        Some((_, Some(kind))) => (
            kind,
            doc.message.unwrap_or_else(|| format!("Script failed with {kind}")),
        ),
        Some((raw, None)) => (
            ErrorKind::WrapperError,
            format!("Result file reported an unrecognized error kind: {raw}"),
        ),
        None => (
            ErrorKind::WrapperError,
            "Result file reported failure without an error kind".to_string(),
        ),
    };

    Ok(OutcomeRecord::failure(kind, message)
        .with_streams(stdout, stderr)
        .with_diagnostics(Diagnostics {
            error_type: doc.error_type,
            traceback: doc.traceback.map(cap_traceback),
            suggestions: doc.suggestions,
            available_functions: doc.available_functions,
            exit_code: failed_exit,
            duration_ms: Some(duration_ms),
        }))
}

/// Keep the tail of an over-long traceback; the raising frame is at the end.
fn cap_traceback(traceback: String) -> String {
    if traceback.len() <= MAX_TRACEBACK_BYTES {
        return traceback;
    }
    let mut start = traceback.len() - MAX_TRACEBACK_BYTES;
    while !traceback.is_char_boundary(start) {
        start += 1;
    }
    format!("{TRUNCATION_MARKER}{}", &traceback[start..])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
