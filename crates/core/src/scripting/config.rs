//! Sandbox settings shared by the orchestrator and its launcher.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::launcher::{DirectLauncher, NsjailLauncher, SandboxLauncher};

/// How execution units are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxMode {
    /// Through nsjail with the configured policy file.
    Nsjail,
    /// Straight into the interpreter, unisolated. Development and tests only.
    Direct,
}

impl FromStr for SandboxMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nsjail" => Ok(Self::Nsjail),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown sandbox mode '{other}' (expected 'nsjail' or 'direct')")),
        }
    }
}

impl fmt::Display for SandboxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nsjail => f.write_str("nsjail"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// Fixed, startup-time sandbox configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub mode: SandboxMode,
    pub nsjail_bin: PathBuf,
    /// Pre-provisioned nsjail policy file.
    pub nsjail_config: PathBuf,
    /// Interpreter used inside the sandbox.
    pub python_bin: PathBuf,
    /// Wall-clock budget per execution.
    pub timeout: Duration,
    /// Directory under which scratch workspaces are created.
    pub scratch_root: PathBuf,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mode: SandboxMode::Nsjail,
            nsjail_bin: PathBuf::from("nsjail"),
            nsjail_config: PathBuf::from("/app/nsjail.cfg"),
            python_bin: PathBuf::from("/usr/bin/python3"),
            timeout: Duration::from_secs(5),
            scratch_root: std::env::temp_dir(),
        }
    }
}

impl SandboxConfig {
    /// Build the launcher for the configured mode.
    pub fn launcher(&self) -> Arc<dyn SandboxLauncher> {
        match self.mode {
            SandboxMode::Nsjail => Arc::new(NsjailLauncher::new(
                &self.nsjail_bin,
                &self.nsjail_config,
                &self.python_bin,
            )),
            SandboxMode::Direct => Arc::new(DirectLauncher::new(&self.python_bin)),
        }
    }
}
