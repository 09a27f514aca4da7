//! Core types for the acquisition pipeline

use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for one inbound request
///
/// Also keys the request's workspace directory, which is how workspace path
/// uniqueness across concurrent requests is guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a fresh random request identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The single validated output file of a successful execution
///
/// Descriptor only — the bytes live inside the workspace and are streamed out
/// through the pipeline's [`AudioStream`](crate::pipeline::AudioStream), never
/// exposed as a bare path to callers outside the pipeline.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Absolute path inside the workspace
    pub path: PathBuf,

    /// Size in bytes
    pub len: u64,

    /// File name (for Content-Disposition)
    pub file_name: String,

    /// Best-effort media type label derived from the extension
    pub media_type: &'static str,
}

/// Best-effort media type for a recognized audio extension
///
/// Unrecognized extensions fall back to `audio/mpeg`, matching the behavior
/// of serving unknown audio containers as a generic stream.
pub fn media_type_for(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "m4a" => "audio/mp4",
        "webm" => "audio/webm",
        "opus" => "audio/opus",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "audio/mpeg",
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_display_is_uuid() {
        let id = RequestId::new();
        let rendered = id.to_string();
        assert_eq!(Uuid::parse_str(&rendered).unwrap(), id.0);
    }

    #[test]
    fn test_media_type_mapping() {
        assert_eq!(media_type_for("m4a"), "audio/mp4");
        assert_eq!(media_type_for("M4A"), "audio/mp4");
        assert_eq!(media_type_for("webm"), "audio/webm");
        assert_eq!(media_type_for("opus"), "audio/opus");
        assert_eq!(media_type_for("mp3"), "audio/mpeg");
        assert_eq!(media_type_for("wav"), "audio/wav");
        assert_eq!(media_type_for("flac"), "audio/mpeg");
    }
}
