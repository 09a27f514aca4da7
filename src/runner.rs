//! External downloader execution with deadline and cancellation
//!
//! Launches the external tool as a child process confined to a request
//! workspace, enforces a hard wall-clock deadline, and supports external
//! cancellation. Stderr is captured with a fixed cap so a chatty tool can
//! never grow memory unbounded.

use crate::error::{Error, Result};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default external downloader binary name
pub const DEFAULT_TOOL: &str = "yt-dlp";

/// Audio format selection passed to the downloader
const FORMAT_SELECTOR: &str = "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio";

/// Workspace-relative output template; the tool fills in the real extension
const OUTPUT_TEMPLATE: &str = "audio.%(ext)s";

/// Maximum bytes of stderr retained per execution
const STDERR_CAP: usize = 8 * 1024;

/// Marker appended when captured stderr exceeds [`STDERR_CAP`]
const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Grace period between SIGTERM and SIGKILL escalation
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Terminal state of one external execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Tool exited with code zero
    Succeeded,
    /// Tool was terminated at the deadline
    TimedOut,
    /// Tool exited with a non-zero code
    Failed,
    /// Tool was terminated by external cancellation
    Cancelled,
}

/// Outcome of one external execution bound to a workspace
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Terminal classification
    pub status: ExecutionStatus,

    /// Exit code, if the process exited on its own
    pub exit_code: Option<i32>,

    /// Captured stderr, truncated at [`STDERR_CAP`]
    pub stderr: String,
}

/// Runs the external downloader confined to a workspace
///
/// The working directory of the child is the workspace and the output
/// template is workspace-relative, so the tool has no ambient write access
/// beyond that directory.
///
/// # Examples
///
/// ```no_run
/// use audio_dl::{ProcessRunner, WorkspaceManager};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runner = ProcessRunner::from_path().expect("yt-dlp not found in PATH");
/// let manager = WorkspaceManager::new(std::env::temp_dir().join("audio-dl"));
/// let workspace = manager.create().await?;
///
/// let result = runner
///     .run(
///         "https://example.com/watch?v=abc",
///         &workspace,
///         Duration::from_secs(300),
///         &CancellationToken::new(),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary_path: PathBuf,
}

impl ProcessRunner {
    /// Create a runner with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find the downloader in PATH
    ///
    /// Uses the `which` crate to search for the [`DEFAULT_TOOL`] binary.
    /// Returns `None` if it is not installed.
    pub fn from_path() -> Option<Self> {
        which::which(DEFAULT_TOOL).ok().map(Self::new)
    }

    /// Resolve a runner from an optional configured path, falling back to PATH discovery
    pub fn resolve(tool_path: Option<PathBuf>) -> Result<Self> {
        match tool_path {
            Some(path) => Ok(Self::new(path)),
            None => Self::from_path().ok_or_else(|| {
                Error::ExternalTool(format!("{DEFAULT_TOOL} not found in PATH"))
            }),
        }
    }

    /// Execute the downloader for one URL inside the given workspace
    ///
    /// Enforces `deadline` as a hard wall-clock bound: a process still running
    /// at the deadline is sent SIGTERM, then SIGKILL after a short grace
    /// period, and the result is classified [`ExecutionStatus::TimedOut`].
    /// Cancelling `cancel` takes the same forced-termination path with
    /// [`ExecutionStatus::Cancelled`].
    ///
    /// Only a failure to spawn or reap the process is an `Err`; every outcome
    /// of a process that actually ran is an `Ok(ExecutionResult)`.
    pub async fn run(
        &self,
        url: &str,
        workspace: &Workspace,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult> {
        let mut child = Command::new(&self.binary_path)
            .arg("-f")
            .arg(FORMAT_SELECTOR)
            .arg("--no-playlist")
            .arg("--no-post-overwrites")
            .arg("-o")
            .arg(OUTPUT_TEMPLATE)
            .arg(url)
            .current_dir(workspace.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "failed to execute {}: {e}",
                    self.binary_path.display()
                ))
            })?;

        // Drain stderr concurrently so the child can never block on a full pipe.
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, STDERR_CAP)));

        let (status, exit_code) = tokio::select! {
            exit = child.wait() => {
                let exit = exit.map_err(|e| {
                    Error::ExternalTool(format!("failed to wait for child: {e}"))
                })?;
                if exit.success() {
                    (ExecutionStatus::Succeeded, exit.code())
                } else {
                    (ExecutionStatus::Failed, exit.code())
                }
            }
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(
                    request_id = %workspace.id(),
                    deadline_secs = deadline.as_secs(),
                    "Deadline exceeded, terminating external tool"
                );
                terminate(&mut child).await;
                (ExecutionStatus::TimedOut, None)
            }
            _ = cancel.cancelled() => {
                tracing::debug!(
                    request_id = %workspace.id(),
                    "Cancelled, terminating external tool"
                );
                terminate(&mut child).await;
                (ExecutionStatus::Cancelled, None)
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        Ok(ExecutionResult {
            status,
            exit_code,
            stderr,
        })
    }
}

/// Forcefully terminate a child process
///
/// On unix, sends SIGTERM first so the tool can clean up partial files, then
/// escalates to SIGKILL if the process is still alive after [`KILL_GRACE`].
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: signalling a child process we spawned and still own
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok() {
            return;
        }
        tracing::warn!(pid, "Child ignored SIGTERM, escalating to SIGKILL");
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill child process");
    }
}

/// Read a stream to EOF, retaining at most `cap` bytes
///
/// Excess output is discarded and the result is marked truncated; the full
/// stream is always drained so the writer never blocks.
async fn read_capped<R: tokio::io::AsyncRead + Unpin>(mut reader: R, cap: usize) -> String {
    let mut retained = Vec::with_capacity(1024);
    let mut truncated = false;
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if retained.len() < cap {
                    let take = n.min(cap - retained.len());
                    retained.extend_from_slice(&buf[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    let mut text = String::from_utf8_lossy(&retained).trim_end().to_string();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}
