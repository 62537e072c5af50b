use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use jailrun_core::scripting::config::{SandboxConfig, SandboxMode};

/// Headroom the HTTP request timeout must leave above the script timeout
/// for process teardown, stream draining, and workspace cleanup.
pub const REQUEST_TIMEOUT_MARGIN_SECS: u64 = 2;

/// A configuration variable was present but unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'text' or 'json')")),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults matching the reference container deployment
/// (nsjail policy at `/app/nsjail.cfg`, port 8080, 5 second script budget).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body (default: 1 MiB).
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    pub sandbox: SandboxConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default             |
    /// |------------------------|---------------------|
    /// | `HOST`                 | `0.0.0.0`           |
    /// | `PORT`                 | `8080`              |
    /// | `CORS_ORIGINS`         | (none)              |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                |
    /// | `MAX_BODY_BYTES`       | `1048576`           |
    /// | `SANDBOX_MODE`         | `nsjail`            |
    /// | `NSJAIL_BIN`           | `nsjail`            |
    /// | `NSJAIL_CONFIG`        | `/app/nsjail.cfg`   |
    /// | `PYTHON_BIN`           | `/usr/bin/python3`  |
    /// | `SCRIPT_TIMEOUT_SECS`  | `5`                 |
    /// | `SCRATCH_DIR`          | OS temp dir         |
    /// | `LOG_FORMAT`           | `text`              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = SandboxConfig::default();

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_var(&lookup, "PORT", 8080)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let max_body_bytes: usize = parse_var(&lookup, "MAX_BODY_BYTES", 1024 * 1024)?;
        let log_format: LogFormat = parse_var(&lookup, "LOG_FORMAT", LogFormat::Text)?;

        let mode: SandboxMode = parse_var(&lookup, "SANDBOX_MODE", defaults.mode)?;
        let script_timeout_secs: u64 =
            parse_var(&lookup, "SCRIPT_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if script_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SCRIPT_TIMEOUT_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let min_request_timeout = script_timeout_secs.saturating_add(REQUEST_TIMEOUT_MARGIN_SECS);
        if request_timeout_secs < min_request_timeout {
            return Err(ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                value: request_timeout_secs.to_string(),
                reason: format!(
                    "must be at least {min_request_timeout} (SCRIPT_TIMEOUT_SECS + {REQUEST_TIMEOUT_MARGIN_SECS}) \
                     so timed-out scripts are still reported"
                ),
            });
        }

        let path_var = |var: &str, default: PathBuf| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let sandbox = SandboxConfig {
            mode,
            nsjail_bin: path_var("NSJAIL_BIN", defaults.nsjail_bin),
            nsjail_config: path_var("NSJAIL_CONFIG", defaults.nsjail_config),
            python_bin: path_var("PYTHON_BIN", defaults.python_bin),
            timeout: Duration::from_secs(script_timeout_secs),
            scratch_root: path_var("SCRATCH_DIR", defaults.scratch_root),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            log_format,
            sandbox,
        })
    }
}

/// Parse `var` if set, falling back to `default`.
fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
