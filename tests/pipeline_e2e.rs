//! End-to-end acquisition pipeline tests
//!
//! These tests drive the real pipeline against small shell scripts standing
//! in for the external downloader, verifying outcome classification and
//! workspace cleanup on every exit path.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use audio_dl::{AcquisitionPipeline, AdmissionPolicy, Error, PipelineConfig};
use futures::StreamExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const VALID_URL: &str = "https://www.youtube.com/watch?v=abc123";

/// Write an executable shell script standing in for the external tool
fn fake_tool(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("fake-tool.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn pipeline_with(tool: PathBuf, root: &Path) -> AcquisitionPipeline {
    let config = PipelineConfig {
        tool_path: Some(tool),
        workspace_root: Some(root.to_path_buf()),
        deadline_secs: 30,
        max_concurrent: 1,
        admission: AdmissionPolicy::FailFast,
        ..Default::default()
    };
    AcquisitionPipeline::new(&config).unwrap()
}

/// True if the workspace root contains no entries (or was never created)
fn workspace_root_empty(root: &Path) -> bool {
    match root.read_dir() {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

#[tokio::test]
async fn scenario_a_success_streams_artifact_and_removes_workspace() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "printf 'audio-bytes' > audio.m4a");
    let pipeline = pipeline_with(tool, root.path());

    let mut stream = pipeline.acquire(VALID_URL).await.unwrap();

    let artifact = stream.artifact().clone();
    assert_eq!(artifact.media_type, "audio/mp4");
    assert_eq!(artifact.file_name, "audio.m4a");
    assert_eq!(artifact.len, 11);

    // Workspace still exists while the stream is open.
    assert!(!workspace_root_empty(root.path()));

    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(bytes, b"audio-bytes");

    drop(stream);
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn scenario_b_deadline_overrun_is_timed_out_with_no_leftovers() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "sleep 30");

    let config = PipelineConfig {
        tool_path: Some(tool),
        workspace_root: Some(root.path().to_path_buf()),
        deadline_secs: 1,
        ..Default::default()
    };
    let pipeline = AcquisitionPipeline::new(&config).unwrap();

    let started = Instant::now();
    let result = pipeline.acquire(VALID_URL).await;

    assert!(matches!(result, Err(Error::TimedOut)));
    // Deadline plus termination grace, with slack for slow CI; well under
    // the script's own 30 s sleep, so the child did not run to completion.
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn scenario_c_malformed_url_never_creates_a_workspace() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "printf 'audio-bytes' > audio.m4a");
    let pipeline = pipeline_with(tool, root.path());

    let result = pipeline.acquire("not-a-url").await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    // Validation precedes allocation: no workspace directory was created.
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn scenario_d_tool_failure_carries_stderr_and_removes_workspace() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "echo 'ERROR: video unavailable' >&2\nexit 1");
    let pipeline = pipeline_with(tool, root.path());

    let result = pipeline.acquire(VALID_URL).await;

    match result {
        Err(Error::ToolFailed { stderr }) => {
            assert!(stderr.contains("ERROR: video unavailable"));
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn ambiguous_output_is_an_error_and_workspace_is_removed() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "touch audio.m4a extra.mp3");
    let pipeline = pipeline_with(tool, root.path());

    let result = pipeline.acquire(VALID_URL).await;

    assert!(matches!(result, Err(Error::AmbiguousOutput { found: 2 })));
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn gate_rejects_excess_concurrent_requests() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "sleep 1\nprintf 'audio-bytes' > audio.m4a");
    let pipeline = pipeline_with(tool, root.path());

    let mut handles = Vec::new();
    for _ in 0..3 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline.acquire(VALID_URL).await
        }));
    }

    let mut succeeded = 0;
    let mut overloaded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(stream) => {
                drop(stream);
                succeeded += 1;
            }
            Err(Error::Overloaded) => overloaded += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    // Capacity 1, fail-fast: exactly one request ran, the rest were rejected
    // without spawning anything.
    assert_eq!(succeeded, 1);
    assert_eq!(overloaded, 2);
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn shutdown_cancels_in_flight_execution() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let tool = fake_tool(&tools, "sleep 30");
    let pipeline = pipeline_with(tool, root.path());

    let task = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.acquire(VALID_URL).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    pipeline.shutdown();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(workspace_root_empty(root.path()));
}

#[tokio::test]
async fn dropped_request_future_reclaims_workspace_and_slot() {
    let tools = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();

    // Until the marker file appears the tool hangs; afterwards it completes
    // immediately. Lets the same pipeline (capacity 1) be exercised twice.
    let marker = tools.path().join("finish-fast");
    let tool = fake_tool(
        &tools,
        &format!(
            "if [ -f '{}' ]; then\n  printf 'audio-bytes' > audio.m4a\n  exit 0\nfi\nsleep 30",
            marker.display()
        ),
    );
    let pipeline = pipeline_with(tool, root.path());

    let task = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.acquire(VALID_URL).await })
    };

    tokio::time::sleep(Duration::from_millis(200)).await;
    // Simulates a client disconnect: the request future is dropped mid-run.
    task.abort();
    let _ = task.await;

    // Guards run on drop; give the child reaper a moment.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(workspace_root_empty(root.path()));

    // The admission slot came back too: with capacity 1, a fresh request on
    // the same pipeline is admitted and succeeds.
    std::fs::write(&marker, b"").unwrap();
    let stream = pipeline.acquire(VALID_URL).await.unwrap();
    drop(stream);
    assert!(workspace_root_empty(root.path()));
}
