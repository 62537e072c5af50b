//! Handler for script execution.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use jailrun_core::scripting::unit::ScriptSource;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::OutcomeResponse;
use crate::state::AppState;

/// POST /execute
///
/// Body: `{"script": "<python source>"}`. The script must define a
/// zero-argument `main()` whose return value becomes `result`.
pub async fn execute_script(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<OutcomeResponse> {
    let Json(body) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::InvalidInput(format!("Request body must be a JSON object: {}", rejection.body_text()))
        }
    })?;

    let source = extract_script(&body)?;
    let outcome = state.orchestrator.execute(source).await;
    Ok(OutcomeResponse(outcome))
}

/// Pull a non-blank `script` string out of the request body.
fn extract_script(body: &Value) -> AppResult<ScriptSource> {
    let Some(fields) = body.as_object() else {
        return Err(AppError::InvalidInput(
            "Request body must be a JSON object".to_string(),
        ));
    };
    match fields.get("script") {
        None | Some(Value::Null) => Err(AppError::InvalidInput(
            "No script provided".to_string(),
        )),
        Some(Value::String(script)) if script.trim().is_empty() => Err(AppError::InvalidInput(
            "No script provided".to_string(),
        )),
        Some(Value::String(script)) => Ok(ScriptSource::new(script.as_str())),
        Some(_) => Err(AppError::InvalidInput(
            "'script' must be a string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_string_script() {
        let source = extract_script(&json!({"script": "def main():\n    return 1\n"}))
            .expect("valid body");
        assert_eq!(source.as_str(), "def main():\n    return 1\n");
    }

    #[test]
    fn rejects_missing_blank_or_non_string_script() {
        for body in [
            json!({}),
            json!({"script": null}),
            json!({"script": ""}),
            json!({"script": "   \n"}),
            json!({"script": 42}),
            json!({"script": ["def main(): pass"]}),
            json!("def main(): pass"),
            json!([1, 2]),
        ] {
            assert_matches!(extract_script(&body), Err(AppError::InvalidInput(_)), "{body}");
        }
    }
}
