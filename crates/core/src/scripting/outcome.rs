//! Canonical execution outcome and the stable error taxonomy.
//!
//! [`ErrorKind`] values are part of the public API: their snake_case wire
//! names must never change. [`OutcomeRecord`] is built once (by the
//! classifier or the orchestrator's failure boundary) and is read-only
//! afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every way an execution request can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request did not carry a usable script.
    InvalidInput,
    /// The script defines no `main`.
    MissingMain,
    /// `main` exists but is not a zero-argument callable.
    InvalidMain,
    /// `main` raised.
    RuntimeError,
    /// The wrapper could not build or serialize the outcome.
    WrapperError,
    /// The side-channel file exists but is not a valid result document.
    JsonDecodeError,
    /// The process exited cleanly without writing a result.
    NoResult,
    /// The wall-clock budget ran out and the process tree was killed.
    Timeout,
    /// The execution machinery failed.
    SystemError,
    /// Failure in the transport layer, outside the execution core.
    InternalServerError,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::InvalidInput,
        ErrorKind::MissingMain,
        ErrorKind::InvalidMain,
        ErrorKind::RuntimeError,
        ErrorKind::WrapperError,
        ErrorKind::JsonDecodeError,
        ErrorKind::NoResult,
        ErrorKind::Timeout,
        ErrorKind::SystemError,
        ErrorKind::InternalServerError,
    ];

    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::MissingMain => "missing_main",
            Self::InvalidMain => "invalid_main",
            Self::RuntimeError => "runtime_error",
            Self::WrapperError => "wrapper_error",
            Self::JsonDecodeError => "json_decode_error",
            Self::NoResult => "no_result",
            Self::Timeout => "timeout",
            Self::SystemError => "system_error",
            Self::InternalServerError => "internal_server_error",
        }
    }

    /// Parse a kind written by the in-process wrapper.
    ///
    /// Only the four kinds the wrapper can produce are accepted; anything
    /// else in a side-channel file is not trusted.
    pub fn from_wrapper(name: &str) -> Option<Self> {
        match name {
            "missing_main" => Some(Self::MissingMain),
            "invalid_main" => Some(Self::InvalidMain),
            "runtime_error" => Some(Self::RuntimeError),
            "wrapper_error" => Some(Self::WrapperError),
            _ => None,
        }
    }

    /// Whether the failure is caused by the submitted script or request
    /// rather than by the service.
    pub fn is_user_attributable(self) -> bool {
        matches!(
            self,
            Self::InvalidInput
                | Self::MissingMain
                | Self::InvalidMain
                | Self::RuntimeError
                | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional diagnostic fields, flattened into the outcome on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Exception class name for `runtime_error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Opaque traceback text, size-capped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    /// Public callables the script defined, reported for `missing_main`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_functions: Option<Vec<String>>,
    /// Raw process exit code, attached when the process did not exit cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Wall-clock time spent in the sandbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The classified result of one execution.
///
/// A successful record never carries an [`ErrorKind`]; the constructors are
/// the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    success: bool,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
    message: String,
    #[serde(rename = "result", skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    stdout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
    #[serde(flatten)]
    diagnostics: Diagnostics,
}

impl OutcomeRecord {
    /// A successful run returning `payload` (which may be JSON `null`).
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            error_kind: None,
            message: "Execution completed successfully".to_string(),
            payload: Some(payload),
            stdout: String::new(),
            stderr: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            message: message.into(),
            payload: None,
            stdout: String::new(),
            stderr: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Attach captured streams. Empty stderr is recorded as absent.
    pub fn with_streams(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        let stderr = stderr.into();
        self.stderr = (!stderr.is_empty()).then_some(stderr);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Rewrite stdout and stderr, e.g. to drop sandbox log noise before the
    /// record leaves the service.
    pub fn map_streams(mut self, f: impl Fn(&str) -> String) -> Self {
        self.stdout = f(&self.stdout);
        self.stderr = self
            .stderr
            .as_deref()
            .map(&f)
            .filter(|s| !s.is_empty());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_wire_names_are_stable() {
        for kind in ErrorKind::ALL {
            let wire = serde_json::to_value(kind).expect("serialize kind");
            assert_eq!(wire, Value::String(kind.as_str().to_string()));
        }
        assert_eq!(ErrorKind::JsonDecodeError.as_str(), "json_decode_error");
        assert_eq!(
            ErrorKind::InternalServerError.to_string(),
            "internal_server_error"
        );
    }

    #[test]
    fn wrapper_kinds_only() {
        assert_eq!(
            ErrorKind::from_wrapper("missing_main"),
            Some(ErrorKind::MissingMain)
        );
        assert_eq!(
            ErrorKind::from_wrapper("wrapper_error"),
            Some(ErrorKind::WrapperError)
        );
        assert_eq!(ErrorKind::from_wrapper("timeout"), None);
        assert_eq!(ErrorKind::from_wrapper("system_error"), None);
    }

    #[test]
    fn attribution_split() {
        let user: Vec<_> = ErrorKind::ALL
            .into_iter()
            .filter(|k| k.is_user_attributable())
            .collect();
        assert_eq!(
            user,
            vec![
                ErrorKind::InvalidInput,
                ErrorKind::MissingMain,
                ErrorKind::InvalidMain,
                ErrorKind::RuntimeError,
                ErrorKind::Timeout,
            ]
        );
    }

    #[test]
    fn success_serializes_result_even_when_null() {
        let record = OutcomeRecord::success(Value::Null);
        let wire = serde_json::to_value(&record).expect("serialize");
        assert_eq!(wire["success"], true);
        assert!(wire.get("result").is_some());
        assert!(wire["result"].is_null());
        assert!(wire.get("error").is_none());
        assert!(wire.get("stderr").is_none());
    }

    #[test]
    fn failure_flattens_diagnostics() {
        let record = OutcomeRecord::failure(ErrorKind::RuntimeError, "boom")
            .with_streams("partial", "warning")
            .with_diagnostics(Diagnostics {
                error_type: Some("ValueError".to_string()),
                traceback: Some("Traceback ...".to_string()),
                ..Diagnostics::default()
            });
        let wire = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            wire,
            json!({
                "success": false,
                "error": "runtime_error",
                "message": "boom",
                "stdout": "partial",
                "stderr": "warning",
                "error_type": "ValueError",
                "traceback": "Traceback ...",
            })
        );
    }

    #[test]
    fn map_streams_drops_emptied_stderr() {
        let record = OutcomeRecord::success(json!(1))
            .with_streams("out", "noise")
            .map_streams(|s| if s == "noise" { String::new() } else { s.to_uppercase() });
        assert_eq!(record.stdout(), "OUT");
        assert_eq!(record.stderr(), None);
    }

    #[test]
    fn diagnostics_empty_by_default() {
        assert!(Diagnostics::default().is_empty());
        let d = Diagnostics {
            exit_code: Some(1),
            ..Diagnostics::default()
        };
        assert!(!d.is_empty());
    }
}
