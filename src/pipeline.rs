//! Request-scoped acquisition pipeline
//!
//! Orchestrates one request from URL validation to a streamable artifact:
//! Validate → Admit → Workspace → Run → Resolve → Stream → Cleanup, in that
//! order, with cleanup unconditionally reachable from every step after
//! admission. The pipeline exclusively owns the workspace and execution for
//! the duration of the request; nothing outside it ever sees a bare
//! workspace path.

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::gate::{ConcurrencyGate, Permit};
use crate::resolver;
use crate::runner::{ExecutionStatus, ProcessRunner};
use crate::types::Artifact;
use crate::workspace::{Workspace, WorkspaceManager};
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use url::Url;

/// The managed external-process acquisition pipeline
///
/// One instance serves all requests; per-request state (workspace, child
/// process, permit) lives in the future returned by [`acquire`](Self::acquire)
/// and in the [`AudioStream`] it yields, so dropping either reclaims
/// everything.
#[derive(Debug, Clone)]
pub struct AcquisitionPipeline {
    gate: ConcurrencyGate,
    workspaces: WorkspaceManager,
    runner: ProcessRunner,
    deadline: Duration,
    extensions: Vec<String>,
    shutdown: CancellationToken,
}

impl AcquisitionPipeline {
    /// Build a pipeline from configuration
    ///
    /// Fails with [`Error::ExternalTool`] if no downloader binary is
    /// configured and none can be found in PATH.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let runner = ProcessRunner::resolve(config.tool_path.clone())?;

        Ok(Self {
            gate: ConcurrencyGate::new(config.max_concurrent, config.admission),
            workspaces: WorkspaceManager::new(config.effective_workspace_root()),
            runner,
            deadline: config.deadline(),
            extensions: config.extensions.clone(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Signal all in-flight executions to terminate
    ///
    /// Used on graceful shutdown; affected requests observe
    /// [`Error::Cancelled`] and their workspaces are removed as usual.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Execute one acquisition end to end
    ///
    /// Returns an open, streamable handle to the artifact bytes, or a
    /// classified error. The handle owns the workspace and admission slot;
    /// both are released when the stream is fully read or dropped (e.g. the
    /// client disconnected mid-transfer), never before.
    pub async fn acquire(&self, raw_url: &str) -> Result<AudioStream> {
        // Validation is local, synchronous, and side-effect-free: a malformed
        // URL allocates nothing, not even an admission slot.
        let url = validate_url(raw_url)?;

        let permit = self.gate.acquire().await?;
        let workspace = self.workspaces.create().await?;

        tracing::info!(request_id = %workspace.id(), url = %url, "Starting acquisition");

        // From here on the workspace and permit guards make cleanup
        // unconditional: every early return below releases both.
        let cancel = self.shutdown.child_token();
        let result = self
            .runner
            .run(url.as_str(), &workspace, self.deadline, &cancel)
            .await?;

        match result.status {
            ExecutionStatus::Succeeded => {}
            ExecutionStatus::TimedOut => return Err(Error::TimedOut),
            ExecutionStatus::Cancelled => return Err(Error::Cancelled),
            ExecutionStatus::Failed => {
                tracing::warn!(
                    request_id = %workspace.id(),
                    exit_code = ?result.exit_code,
                    "External tool failed"
                );
                return Err(Error::ToolFailed {
                    stderr: result.stderr,
                });
            }
        }

        let artifact = resolver::resolve(&workspace, &self.extensions).await?;

        let file = tokio::fs::File::open(&artifact.path).await.map_err(|e| {
            Error::Resource(format!(
                "failed to open artifact {}: {e}",
                artifact.path.display()
            ))
        })?;

        tracing::info!(
            request_id = %workspace.id(),
            bytes = artifact.len,
            media_type = artifact.media_type,
            "Acquisition complete"
        );

        Ok(AudioStream {
            inner: ReaderStream::new(file),
            artifact,
            _workspace: workspace,
            _permit: permit,
        })
    }
}

/// An open handle to a resolved artifact's bytes
///
/// Couples the byte stream to the workspace and admission permit: dropping
/// the stream (fully read, or abandoned on client disconnect) removes the
/// workspace — and the artifact inside it — and frees the execution slot.
#[derive(Debug)]
pub struct AudioStream {
    // Field order matters: the file handle must close before the workspace
    // guard removes the directory tree.
    inner: ReaderStream<tokio::fs::File>,
    artifact: Artifact,
    _workspace: Workspace,
    _permit: Permit,
}

impl AudioStream {
    /// Descriptor of the artifact being streamed
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }
}

impl Stream for AudioStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

/// Check a raw URL against the allow-listed shape
///
/// Accepts absolute http/https URLs with a host. Anything else is rejected
/// before any resource is allocated or any process is spawned.
fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|_| Error::InvalidInput(format!("not a valid URL: {raw:?}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidInput(format!(
                "unsupported URL scheme {other:?}, expected http or https"
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(Error::InvalidInput(format!("URL has no host: {raw:?}")));
    }

    Ok(url)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdmissionPolicy;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("https://www.youtube.com/watch?v=abc123").is_ok());
        assert!(validate_url("http://example.com/media").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_malformed_input() {
        for raw in ["not-a-url", "", "   ", "youtube.com/watch"] {
            assert!(
                matches!(validate_url(raw), Err(Error::InvalidInput(_))),
                "should reject {raw:?}"
            );
        }
    }

    #[test]
    fn test_validate_url_rejects_non_http_schemes() {
        for raw in ["file:///etc/passwd", "ftp://example.com/a", "data:text/plain,x"] {
            assert!(
                matches!(validate_url(raw), Err(Error::InvalidInput(_))),
                "should reject {raw:?}"
            );
        }
    }

    fn test_config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig {
            // Any resolvable path will do for tests that never spawn it.
            tool_path: Some(PathBuf::from("/bin/true")),
            workspace_root: Some(root.to_path_buf()),
            max_concurrent: 1,
            admission: AdmissionPolicy::FailFast,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_malformed_url_creates_no_workspace() {
        let root = tempdir().unwrap();
        let pipeline = AcquisitionPipeline::new(&test_config(root.path())).unwrap();

        let result = pipeline.acquire("not-a-url").await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        // No filesystem side effects: the workspace root was never populated
        // (nor even created, since validation precedes allocation).
        let populated = root
            .path()
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        assert!(!populated);
    }

    #[tokio::test]
    async fn test_admission_slot_returned_after_invalid_input() {
        let root = tempdir().unwrap();
        let pipeline = AcquisitionPipeline::new(&test_config(root.path())).unwrap();

        // Repeated invalid requests must not leak permits.
        for _ in 0..3 {
            let result = pipeline.acquire("not-a-url").await;
            assert!(matches!(result, Err(Error::InvalidInput(_))));
        }
    }
}
