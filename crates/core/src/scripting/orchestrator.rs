//! Central execution orchestrator.
//!
//! Ties the pieces together for one request: allocate a scratch workspace,
//! build and write the execution unit, run it in the sandbox, classify the
//! result, and remove the workspace. [`ScriptOrchestrator::execute`] never
//! fails; machinery errors come back as `system_error` outcomes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::classifier::classify;
use super::config::SandboxConfig;
use super::launcher::SandboxLauncher;
use super::outcome::{Diagnostics, ErrorKind, OutcomeRecord};
use super::subprocess::run_sandboxed;
use super::unit::{ExecutionUnit, ScriptSource};
use super::workspace::ScratchWorkspace;
use crate::error::CoreError;

/// Runs scripts, one sandboxed process and one workspace per call.
///
/// Holds no per-execution state, so a single instance is shared (behind
/// `Arc`) by all concurrent requests.
pub struct ScriptOrchestrator {
    launcher: Arc<dyn SandboxLauncher>,
    timeout: Duration,
    scratch_root: PathBuf,
}

impl ScriptOrchestrator {
    pub fn new(config: &SandboxConfig) -> Self {
        Self::with_launcher(config.launcher(), config.timeout, config.scratch_root.clone())
    }

    pub fn with_launcher(
        launcher: Arc<dyn SandboxLauncher>,
        timeout: Duration,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            launcher,
            timeout,
            scratch_root,
        }
    }

    pub fn launcher_name(&self) -> &'static str {
        self.launcher.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `source` and return its classified outcome.
    ///
    /// The run happens on its own task: if the caller goes away (client
    /// disconnect), the execution still finishes or times out and its
    /// workspace is still removed. A panic inside the task is reported as
    /// `system_error`.
    pub async fn execute(&self, source: ScriptSource) -> OutcomeRecord {
        let fingerprint = source.fingerprint();
        tracing::info!(
            script = %fingerprint,
            script_len = source.len(),
            launcher = self.launcher.name(),
            "Executing script"
        );

        let launcher = Arc::clone(&self.launcher);
        let timeout = self.timeout;
        let scratch_root = self.scratch_root.clone();
        let task = tokio::spawn(async move {
            run_once(launcher.as_ref(), timeout, &scratch_root, &source).await
        });

        let outcome = match task.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => system_error(e),
            Err(join_err) => {
                tracing::error!(script = %fingerprint, error = %join_err, "Execution task failed");
                OutcomeRecord::failure(
                    ErrorKind::SystemError,
                    "Script execution failed due to an internal error",
                )
            }
        };

        tracing::info!(
            script = %fingerprint,
            success = outcome.is_success(),
            kind = outcome.error_kind().map(ErrorKind::as_str).unwrap_or("none"),
            duration_ms = outcome.diagnostics().duration_ms,
            "Execution finished"
        );
        outcome
    }
}

/// Allocate, run, and always tear down one workspace.
async fn run_once(
    launcher: &dyn SandboxLauncher,
    timeout: Duration,
    scratch_root: &std::path::Path,
    source: &ScriptSource,
) -> Result<OutcomeRecord, CoreError> {
    let workspace = ScratchWorkspace::allocate(scratch_root).await?;
    let result = run_in_workspace(&workspace, launcher, timeout, source).await;
    workspace.close().await;
    result
}

async fn run_in_workspace(
    workspace: &ScratchWorkspace,
    launcher: &dyn SandboxLauncher,
    timeout: Duration,
    source: &ScriptSource,
) -> Result<OutcomeRecord, CoreError> {
    let result_path = workspace.result_path();
    let unit = ExecutionUnit::build(source, &result_path)?;
    let unit_path = workspace.write_unit(unit.as_str()).await?;

    let report = run_sandboxed(
        launcher.command(&unit_path),
        workspace.path(),
        &result_path,
        timeout,
    )
    .await?;
    classify(report)
}

/// Convert a machinery failure into its outcome.
fn system_error(err: CoreError) -> OutcomeRecord {
    match err {
        CoreError::ProcessFailed { exit_code, stderr } => {
            tracing::warn!(exit_code, "Sandbox process failed without a result");
            OutcomeRecord::failure(
                ErrorKind::SystemError,
                format!("Sandbox process exited with code {exit_code} without producing a result"),
            )
            .with_streams(String::new(), stderr)
            .with_diagnostics(Diagnostics {
                exit_code: Some(exit_code),
                ..Diagnostics::default()
            })
        }
        other => {
            tracing::error!(error = %other, "Script execution machinery failed");
            OutcomeRecord::failure(
                ErrorKind::SystemError,
                "Script execution failed due to an internal error",
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
