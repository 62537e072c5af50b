use std::path::PathBuf;

/// Failures in the execution machinery itself.
///
/// Problems caused by the submitted script never show up here; those are
/// classified into an [`OutcomeRecord`](crate::scripting::outcome::OutcomeRecord).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Scratch workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch sandbox process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sandbox process failed with exit code {exit_code} and produced no result: {stderr}")]
    ProcessFailed { exit_code: i32, stderr: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_process_failed() {
        let err = CoreError::ProcessFailed {
            exit_code: 255,
            stderr: "nsjail: could not mount /proc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sandbox process failed with exit code 255 and produced no result: nsjail: could not mount /proc"
        );
    }

    #[test]
    fn workspace_error_has_source() {
        let err = CoreError::Workspace {
            path: PathBuf::from("/tmp/jailrun-x"),
            source: std::io::Error::other("disk full"),
        };
        assert!(err.to_string().contains("/tmp/jailrun-x"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_error_converts() {
        let err: CoreError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("I/O error:"));
    }
}
