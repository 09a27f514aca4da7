//! # audio-dl
//!
//! HTTP service that turns a media URL into a streamed audio artifact by
//! supervising an external downloader/converter (`yt-dlp`).
//!
//! ## Design Philosophy
//!
//! - **One request, one workspace** - every request gets an isolated
//!   temporary directory, removed on every exit path
//! - **Bounded everything** - concurrent executions, wall-clock deadline,
//!   captured stderr: all capped
//! - **Cancellable** - client disconnects and shutdown signals terminate the
//!   child process promptly, never leaking a process or a workspace
//!
//! ## Quick Start
//!
//! ```no_run
//! use audio_dl::{AcquisitionPipeline, Config, api};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_env()?);
//!     let pipeline = Arc::new(AcquisitionPipeline::new(&config.pipeline)?);
//!
//!     api::start_api_server(pipeline, config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Concurrency gate bounding simultaneous executions
pub mod gate;
/// Request-scoped acquisition pipeline
pub mod pipeline;
/// Workspace output resolution
pub mod resolver;
/// External downloader execution
pub mod runner;
/// Core types
pub mod types;
/// Per-request workspace allocation and cleanup
pub mod workspace;

// Re-export commonly used types
pub use config::{AdmissionPolicy, ApiConfig, Config, PipelineConfig};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use gate::{ConcurrencyGate, Permit};
pub use pipeline::{AcquisitionPipeline, AudioStream};
pub use runner::{ExecutionResult, ExecutionStatus, ProcessRunner};
pub use types::{Artifact, RequestId};
pub use workspace::{Workspace, WorkspaceManager};

/// Wait for a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
#[cfg(unix)]
pub(crate) async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
