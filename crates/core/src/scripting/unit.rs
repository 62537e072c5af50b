//! Execution unit assembly.
//!
//! An [`ExecutionUnit`] is the user's script text followed by a fixed Python
//! wrapper. The wrapper looks up the `main` entry point after the module has
//! loaded, calls it inside a failure boundary, and writes exactly one JSON
//! document to the side-channel path baked into the unit. Assembly is purely
//! textual: the script is never parsed or run here.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Name of the zero-argument function every script must define.
pub const ENTRY_POINT: &str = "main";

/// Placeholder in [`WRAPPER_TEMPLATE`] replaced by the side-channel path literal.
const RESULT_PATH_PLACEHOLDER: &str = "__JAILRUN_RESULT_PATH__";

/// Python appended after the user's code.
///
/// All wrapper state lives inside `_jailrun_finish`, every import is local,
/// and built-ins are reached through the `builtins` module, so user code that
/// rebinds `json`, `open`, `list`, or `str` at module level cannot interfere.
/// The process exit code is 0 only when `main` returned a serializable value.
const WRAPPER_TEMPLATE: &str = r#"

# --- jailrun wrapper (appended) ---
def _jailrun_finish():
    import builtins as _builtins
    import difflib as _difflib
    import inspect as _inspect
    import json as _json
    import os as _os
    import sys as _sys
    import traceback as _traceback

    result_path = __JAILRUN_RESULT_PATH__
    namespace = _builtins.globals()

    def write(text):
        tmp_path = result_path + ".tmp"
        with _builtins.open(tmp_path, "w", encoding="utf-8") as handle:
            handle.write(text)
        _os.replace(tmp_path, result_path)

    def public_callables():
        return _builtins.sorted(
            name
            for name, value in _builtins.list(namespace.items())
            if not name.startswith("_")
            and _builtins.callable(value)
            and _builtins.getattr(value, "__module__", None) == "__main__"
        )

    code = 1
    try:
        if "main" not in namespace:
            available = public_callables()
            suggestions = [
                "Define a function named 'main' that takes no arguments "
                "and returns a JSON-serializable value"
            ]
            for name in _difflib.get_close_matches("main", available, n=3, cutoff=0.5):
                suggestions.append("Did you mean to name '%s' as 'main'?" % (name,))
            outcome = {
                "success": False,
                "error": "missing_main",
                "message": "No 'main' function found in script",
                "available_functions": available,
                "suggestions": suggestions,
            }
        elif not _builtins.callable(namespace["main"]):
            outcome = {
                "success": False,
                "error": "invalid_main",
                "message": "'main' is defined but is not callable (found %s)"
                % (_builtins.type(namespace["main"]).__name__,),
            }
        else:
            entry = namespace["main"]
            try:
                _inspect.signature(entry).bind()
                bindable = True
            except _builtins.TypeError:
                bindable = False
            except _builtins.ValueError:
                bindable = True
            if not bindable:
                outcome = {
                    "success": False,
                    "error": "invalid_main",
                    "message": "'main' must be callable with no arguments",
                    "suggestions": ["Remove the parameters from 'main' or give them defaults"],
                }
            else:
                try:
                    value = entry()
                except _builtins.BaseException as exc:
                    outcome = {
                        "success": False,
                        "error": "runtime_error",
                        "error_type": _builtins.type(exc).__name__,
                        "message": _builtins.str(exc),
                        "traceback": _traceback.format_exc(),
                    }
                else:
                    outcome = {"success": True, "result": value}
        text = _json.dumps(outcome, allow_nan=False)
        if outcome["success"]:
            code = 0
    except _builtins.BaseException as exc:
        try:
            detail = "%s: %s" % (_builtins.type(exc).__name__, exc)
        except _builtins.BaseException:
            detail = "unprintable error"
        text = _json.dumps(
            {
                "success": False,
                "error": "wrapper_error",
                "message": "Failed to build execution result: " + detail,
            }
        )
        code = 1
    try:
        _sys.stdout.flush()
    except _builtins.BaseException:
        pass
    try:
        write(text)
    except _builtins.BaseException:
        return 2
    return code


import sys as _jailrun_sys

_jailrun_sys.exit(_jailrun_finish())
"#;

/// Raw script text as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource(String);

impl ScriptSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short SHA-256 prefix identifying the script in logs without
    /// recording its contents.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let hex = format!("{digest:x}");
        hex[..12].to_string()
    }
}

/// A complete, runnable Python program: user code plus wrapper.
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    text: String,
}

impl ExecutionUnit {
    /// Compose `source` with the wrapper, which will write its outcome to
    /// `result_path`.
    ///
    /// The path is embedded as a JSON string literal, which Python parses
    /// as an equivalent string literal. Paths that are not valid UTF-8 are
    /// rejected since they could not be embedded faithfully.
    pub fn build(source: &ScriptSource, result_path: &Path) -> Result<Self, CoreError> {
        let path = result_path.to_str().ok_or_else(|| {
            CoreError::Internal(format!(
                "Side-channel path is not valid UTF-8: {}",
                result_path.display()
            ))
        })?;
        let literal = serde_json::to_string(path)
            .map_err(|e| CoreError::Internal(format!("Failed to encode side-channel path: {e}")))?;

        let mut text = String::with_capacity(source.len() + WRAPPER_TEMPLATE.len() + literal.len());
        text.push_str(source.as_str());
        if !source.as_str().ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&WRAPPER_TEMPLATE.replace(RESULT_PATH_PLACEHOLDER, &literal));

        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
