//! Workspace output resolution
//!
//! After a successful execution, the workspace may contain the real output
//! plus incidental files the tool wrote (partials, metadata sidecars). The
//! resolver applies the recognized-extension filter and insists on exactly
//! one match — zero or multiple candidates is a defect in our assumptions
//! about the tool's behavior for that input, not a transient condition, and
//! is never retried or resolved by picking an arbitrary file.

use crate::error::{Error, Result};
use crate::types::{Artifact, media_type_for};
use crate::workspace::Workspace;

/// Locate the single produced artifact inside a workspace
///
/// Lists the workspace directory (non-recursive) and keeps files whose
/// extension is in `extensions` (case-insensitive). Returns the artifact
/// descriptor on exactly one match, [`Error::AmbiguousOutput`] otherwise.
pub async fn resolve(workspace: &Workspace, extensions: &[String]) -> Result<Artifact> {
    let mut candidates = Vec::new();

    let mut entries = tokio::fs::read_dir(workspace.path()).await.map_err(|e| {
        Error::Resource(format!(
            "failed to list workspace {}: {e}",
            workspace.path().display()
        ))
    })?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        Error::Resource(format!(
            "failed to list workspace {}: {e}",
            workspace.path().display()
        ))
    })? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();

        if extensions.iter().any(|known| *known == extension) {
            candidates.push((path, extension));
        }
    }

    if candidates.len() != 1 {
        tracing::warn!(
            request_id = %workspace.id(),
            found = candidates.len(),
            "Workspace did not contain exactly one recognized output"
        );
        return Err(Error::AmbiguousOutput {
            found: candidates.len(),
        });
    }

    // Length checked above; remove() cannot panic here.
    let (path, extension) = candidates.remove(0);

    let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
        Error::Resource(format!("failed to stat artifact {}: {e}", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("audio.{extension}"));

    let artifact = Artifact {
        len: metadata.len(),
        file_name,
        media_type: media_type_for(&extension),
        path,
    };

    tracing::debug!(
        request_id = %workspace.id(),
        artifact = %artifact.path.display(),
        bytes = artifact.len,
        media_type = artifact.media_type,
        "Artifact resolved"
    );

    Ok(artifact)
}
