//! Sandboxed subprocess execution.
//!
//! [`run_sandboxed`] spawns a launcher-built command inside the scratch
//! workspace, enforces the wall-clock timeout, captures stdout/stderr, and
//! reads the side-channel result file once the process has terminated,
//! however it terminated. Nothing here interprets the output; that is the
//! classifier's job.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::CoreError;

/// Maximum stdout or stderr size captured per stream (1 MiB).
///
/// Output beyond the limit is drained and discarded so a chatty script
/// cannot block on a full pipe.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Maximum accepted size of the side-channel result file (8 MiB).
pub const MAX_RESULT_BYTES: u64 = 8 * 1024 * 1024;

/// How long stream readers may keep running after the process has been
/// reaped. A grandchild holding the pipe open past this is abandoned.
const STREAM_GRACE: Duration = Duration::from_secs(1);

/// How the sandboxed process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited on its own with this code.
    Exited(i32),
    /// Killed by this signal (OOM killer, sandbox resource limits).
    Signaled(i32),
    /// Exceeded the wall-clock budget and was killed by the runner.
    TimedOut,
}

impl Termination {
    /// Exit code, with `-N` standing in for death by signal `N`.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            Self::Signaled(signal) => Some(-signal),
            Self::TimedOut => None,
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => Self::Exited(code),
            None => Self::Signaled(exit_signal(status)),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().unwrap_or(0)
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> i32 {
    0
}

/// What was found at the side-channel path after the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideChannel {
    /// No file, or a file that could not be read.
    Missing,
    /// Raw file contents.
    Present(Vec<u8>),
    /// The file exceeded [`MAX_RESULT_BYTES`] and was not loaded.
    Oversized,
}

/// Raw observations from one sandboxed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub termination: Termination,
    /// Captured stdout, trimmed.
    pub stdout: String,
    /// Captured stderr, trimmed.
    pub stderr: String,
    pub side_channel: SideChannel,
    pub duration_ms: u64,
}

/// Run `cmd` in `working_dir` under `timeout` and collect its output.
///
/// The child gets its own process group so that on timeout, or after it
/// exits, every process it started can be killed with a single signal.
/// `kill_on_drop(true)` covers the case where this future is dropped.
pub async fn run_sandboxed(
    mut cmd: Command,
    working_dir: &Path,
    result_path: &Path,
    timeout: Duration,
) -> Result<RunReport, CoreError> {
    cmd.current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(CoreError::Spawn)?;
    let pid = child.id();
    tracing::debug!(pid, "Sandbox process started");

    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let waited = tokio::time::timeout(timeout, wait_for_exit(&mut child)).await;
    let termination = match waited {
        Ok(Ok(())) => {
            // The leader is exited but unreaped, so its pid still names the
            // group. Kill background processes the script left behind, then reap.
            kill_process_group(pid);
            match child.wait().await {
                Ok(status) => Termination::from_status(status),
                Err(e) => {
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(CoreError::Io(e));
                }
            }
        }
        Ok(Err(e)) => {
            kill_process_group(pid);
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            return Err(CoreError::Io(e));
        }
        Err(_elapsed) => {
            tracing::warn!(pid, timeout_ms = timeout.as_millis() as u64, "Sandbox process timed out, killing process group");
            kill_process_group(pid);
            if let Err(e) = child.kill().await {
                tracing::warn!(pid, error = %e, "Failed to kill timed-out sandbox process");
            }
            Termination::TimedOut
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    let stdout = join_stream(stdout_task).await;
    let stderr = join_stream(stderr_task).await;
    let side_channel = read_side_channel(result_path).await;

    tracing::debug!(pid, ?termination, duration_ms, "Sandbox process finished");

    Ok(RunReport {
        termination,
        stdout,
        stderr,
        side_channel,
        duration_ms,
    })
}

/// Read an output stream up to [`MAX_OUTPUT_BYTES`], draining the rest.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

async fn join_stream(mut task: JoinHandle<Vec<u8>>) -> String {
    let bytes = match tokio::time::timeout(STREAM_GRACE, &mut task).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Stream reader task failed");
            Vec::new()
        }
        Err(_) => {
            task.abort();
            tracing::warn!("Output stream still open after process exit, discarding");
            Vec::new()
        }
    };
    String::from_utf8_lossy(&bytes).trim().to_string()
}

async fn read_side_channel(path: &Path) -> SideChannel {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Side-channel file unreadable");
            }
            return SideChannel::Missing;
        }
    };

    let mut buf = Vec::new();
    match file.take(MAX_RESULT_BYTES + 1).read_to_end(&mut buf).await {
        Ok(_) if buf.len() as u64 > MAX_RESULT_BYTES => SideChannel::Oversized,
        Ok(_) => SideChannel::Present(buf),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read side-channel file");
            SideChannel::Missing
        }
    }
}

/// Wait until the child has exited, leaving it unreaped.
///
/// Until the zombie is reaped its pid cannot be reused, so the group id
/// stays safe to signal.
#[cfg(unix)]
async fn wait_for_exit(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    tokio::task::spawn_blocking(move || wait_unreaped(pid))
        .await
        .map_err(std::io::Error::other)?
}

#[cfg(not(unix))]
async fn wait_for_exit(child: &mut Child) -> std::io::Result<()> {
    child.wait().await.map(|_| ())
}

#[cfg(unix)]
fn wait_unreaped(pid: u32) -> std::io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain old data; all-zero is a valid value.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid out-pointer for the duration of the call.
        // WNOWAIT leaves the child in a waitable state for `Child::wait`.
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            // Already reaped (the timeout path's kill got there first).
            Some(libc::ECHILD) => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
///
/// Callers only use this while the leader is still unreaped (running, or a
/// zombie after [`wait_for_exit`]), so the group id cannot have been reused.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal. The child was spawned with
    // `process_group(0)` and has not been reaped, so `pgid` is its group.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, error = %err, "Failed to kill sandbox process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::test_helpers::wait_until_dead;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    async fn run(script: &str, timeout: Duration) -> (tempfile::TempDir, RunReport) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = dir.path().join("result.json");
        let report = run_sandboxed(sh(script), dir.path(), &result, timeout)
            .await
            .expect("run");
        (dir, report)
    }

    #[tokio::test]
    async fn captures_exit_code_and_trimmed_streams() {
        let (_dir, report) = run("echo '  out  '; echo err >&2; exit 3", Duration::from_secs(5)).await;
        assert_eq!(report.termination, Termination::Exited(3));
        assert_eq!(report.termination.exit_code(), Some(3));
        assert_eq!(report.stdout, "out");
        assert_eq!(report.stderr, "err");
        assert_eq!(report.side_channel, SideChannel::Missing);
    }

    #[tokio::test]
    async fn runs_in_working_directory_and_reads_side_channel() {
        let (_dir, report) = run(
            r#"printf '{"success": true, "result": 2}' > result.json"#,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(report.termination, Termination::Exited(0));
        assert_eq!(
            report.side_channel,
            SideChannel::Present(br#"{"success": true, "result": 2}"#.to_vec())
        );
    }

    #[tokio::test]
    async fn side_channel_survives_nonzero_exit() {
        let (_dir, report) = run(
            r#"printf '{"success": false}' > result.json; exit 1"#,
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(report.termination, Termination::Exited(1));
        assert!(matches!(report.side_channel, SideChannel::Present(_)));
    }

    #[tokio::test]
    async fn timeout_kills_process() {
        let started = Instant::now();
        let (_dir, report) = run("sleep 30", Duration::from_millis(200)).await;
        assert_eq!(report.termination, Termination::TimedOut);
        assert_eq!(report.termination.exit_code(), None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_background_children() {
        let (_dir, report) = run("sleep 30 & echo $!; wait", Duration::from_millis(300)).await;
        assert_eq!(report.termination, Termination::TimedOut);
        let pid: i32 = report.stdout.parse().expect("child pid on stdout");
        assert!(wait_until_dead(pid).await, "background child {pid} survived");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_kills_leftover_children() {
        let (_dir, report) = run("sleep 30 >/dev/null 2>&1 & echo $!", Duration::from_secs(5)).await;
        assert_eq!(report.termination, Termination::Exited(0));
        let pid: i32 = report.stdout.parse().expect("child pid on stdout");
        assert!(wait_until_dead(pid).await, "leftover child {pid} survived");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn signal_death_is_reported() {
        let (_dir, report) = run("kill -9 $$", Duration::from_secs(5)).await;
        assert_eq!(report.termination, Termination::Signaled(9));
        assert_eq!(report.termination.exit_code(), Some(-9));
    }

    #[tokio::test]
    async fn output_is_capped_without_blocking() {
        let (_dir, report) = run(
            "head -c 3000000 /dev/zero | tr '\\0' 'a'",
            Duration::from_secs(10),
        )
        .await;
        assert_eq!(report.termination, Termination::Exited(0));
        assert_eq!(report.stdout.len(), MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn oversized_side_channel_is_not_loaded() {
        let script = format!("head -c {} /dev/zero > result.json", MAX_RESULT_BYTES + 10);
        let (_dir, report) = run(&script, Duration::from_secs(10)).await;
        assert_eq!(report.side_channel, SideChannel::Oversized);
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cmd = Command::new("/nonexistent/jailrun-interpreter");
        let err = run_sandboxed(
            cmd,
            dir.path(),
            &dir.path().join("result.json"),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::Spawn(_)));
    }
}
