//! HTTP rendering of execution outcomes.
//!
//! Maps each [`ErrorKind`] to a status code and strips sandbox diagnostics
//! from the captured streams before the record leaves the service.

use std::sync::LazyLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jailrun_core::scripting::outcome::{ErrorKind, OutcomeRecord};
use regex::Regex;

/// nsjail's own log lines, e.g. `[I][2024-05-01T10:00:00+0000] Mode: STANDALONE_ONCE`.
static NSJAIL_LOG_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[[A-Z]\]\[\d{4}-\d{2}-\d{2}T[^\]]*\]").expect("valid regex")
});

/// An outcome ready to be sent to the client.
#[derive(Debug)]
pub struct OutcomeResponse(pub OutcomeRecord);

impl IntoResponse for OutcomeResponse {
    fn into_response(self) -> Response {
        let status = status_for(self.0.error_kind());
        let record = self.0.map_streams(strip_sandbox_log_lines);
        (status, Json(record)).into_response()
    }
}

/// 200 for success, 400 when the caller's script or request is at fault,
/// 500 when the service is.
pub fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        None => StatusCode::OK,
        Some(kind) if kind.is_user_attributable() => StatusCode::BAD_REQUEST,
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Drop nsjail log lines from captured output.
pub fn strip_sandbox_log_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !NSJAIL_LOG_LINE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
