//! Sandbox launch commands.
//!
//! A [`SandboxLauncher`] turns the on-disk unit path into the subprocess
//! command that will run it. The argument template is fixed when the
//! launcher is built at startup; the unit path is the only per-request
//! value that reaches the argument vector.

use std::path::{Path, PathBuf};

use tokio::process::Command;

/// Builds the command that runs an execution unit.
pub trait SandboxLauncher: Send + Sync {
    /// Short name for logs (`nsjail`, `direct`).
    fn name(&self) -> &'static str;

    /// Command that executes the unit at `unit_path`.
    ///
    /// Working directory, stdio, and process-group setup are applied by
    /// [`run_sandboxed`](super::subprocess::run_sandboxed).
    fn command(&self, unit_path: &Path) -> Command;
}

/// Runs the interpreter inside nsjail with a pre-provisioned policy file:
/// `<nsjail> --config <policy> -- <python> <unit>`.
#[derive(Debug, Clone)]
pub struct NsjailLauncher {
    nsjail_bin: PathBuf,
    config_path: PathBuf,
    python_bin: PathBuf,
}

impl NsjailLauncher {
    pub fn new(
        nsjail_bin: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
        python_bin: impl Into<PathBuf>,
    ) -> Self {
        Self {
            nsjail_bin: nsjail_bin.into(),
            config_path: config_path.into(),
            python_bin: python_bin.into(),
        }
    }
}

impl SandboxLauncher for NsjailLauncher {
    fn name(&self) -> &'static str {
        "nsjail"
    }

    fn command(&self, unit_path: &Path) -> Command {
        let mut cmd = Command::new(&self.nsjail_bin);
        cmd.arg("--config")
            .arg(&self.config_path)
            .arg("--")
            .arg(&self.python_bin)
            .arg(unit_path);
        cmd
    }
}

/// Runs the interpreter with no isolation. For local development and tests.
#[derive(Debug, Clone)]
pub struct DirectLauncher {
    python_bin: PathBuf,
}

impl DirectLauncher {
    pub fn new(python_bin: impl Into<PathBuf>) -> Self {
        Self {
            python_bin: python_bin.into(),
        }
    }
}

impl SandboxLauncher for DirectLauncher {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn command(&self, unit_path: &Path) -> Command {
        let mut cmd = Command::new(&self.python_bin);
        // -I: isolated mode, ignore PYTHON* env vars and the user site dir.
        cmd.arg("-I").arg(unit_path);
        cmd
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
