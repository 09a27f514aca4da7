//! Configuration types for audio-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Admission policy for the concurrency gate
///
/// Controls what happens when a request arrives while all execution slots are
/// occupied: fail immediately, or wait briefly for a slot to free up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "mode", content = "wait_ms")]
pub enum AdmissionPolicy {
    /// Reject immediately when no slot is available
    FailFast,
    /// Wait up to the given number of milliseconds for a slot, then reject
    Wait(u64),
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::FailFast
    }
}

/// Acquisition pipeline configuration (concurrency, deadline, output filter)
///
/// Groups settings related to how external downloads are executed and bounded.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineConfig {
    /// Maximum concurrent external executions (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-request wall-clock deadline in seconds (default: 300)
    ///
    /// Caps both the network fetch the external tool performs and any local
    /// transcoding step it may additionally run. The deadline is absolute per
    /// request, not renewable.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Admission policy when all execution slots are occupied
    #[serde(default)]
    pub admission: AdmissionPolicy,

    /// Recognized audio output extensions (default: m4a, webm, opus, mp3, wav)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Path to the external downloader executable (auto-detected from PATH if None)
    #[serde(default)]
    pub tool_path: Option<PathBuf>,

    /// Root directory for per-request workspaces (default: OS temp dir + "audio-dl")
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            deadline_secs: default_deadline_secs(),
            admission: AdmissionPolicy::default(),
            extensions: default_extensions(),
            tool_path: None,
            workspace_root: None,
        }
    }
}

impl PipelineConfig {
    /// Per-request deadline as a [`Duration`]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    /// Effective workspace root, falling back to the OS temp directory
    pub fn effective_workspace_root(&self) -> PathBuf {
        self.workspace_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("audio-dl"))
    }
}

/// API server configuration (bind address, CORS, documentation)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Bind address for the API server (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS middleware (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins ("*" allows any origin)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve interactive Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: false,
        }
    }
}

/// Main configuration for the audio-dl service
///
/// Fields are organized into logical sub-configs:
/// - [`pipeline`](PipelineConfig) — concurrency, deadline, output extensions, tool path
/// - [`api`](ApiConfig) — bind address, CORS, documentation
///
/// All fields have sensible defaults; [`Config::from_env`] layers
/// `AUDIO_DL_*` environment variables on top of them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Acquisition pipeline settings
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    /// API server settings
    #[serde(flatten)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a configuration from defaults overridden by environment variables
    ///
    /// Recognized variables:
    /// - `AUDIO_DL_MAX_CONCURRENT` — maximum concurrent executions
    /// - `AUDIO_DL_DEADLINE_SECS` — per-request deadline in seconds
    /// - `AUDIO_DL_ADMISSION_WAIT_MS` — wait this long for a slot instead of failing fast
    /// - `AUDIO_DL_EXTENSIONS` — comma-separated recognized output extensions
    /// - `AUDIO_DL_TOOL_PATH` — explicit path to the downloader executable
    /// - `AUDIO_DL_WORKSPACE_ROOT` — root directory for per-request workspaces
    /// - `AUDIO_DL_BIND_ADDRESS` — API server bind address
    /// - `AUDIO_DL_CORS_ORIGINS` — comma-separated allowed origins
    ///
    /// Malformed values produce [`Error::Config`] naming the offending variable.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = env_var("AUDIO_DL_MAX_CONCURRENT") {
            config.pipeline.max_concurrent =
                parse_env(&raw, "AUDIO_DL_MAX_CONCURRENT", "a positive integer")?;
            if config.pipeline.max_concurrent == 0 {
                return Err(Error::Config {
                    message: "AUDIO_DL_MAX_CONCURRENT must be at least 1".to_string(),
                    key: Some("AUDIO_DL_MAX_CONCURRENT".to_string()),
                });
            }
        }

        if let Some(raw) = env_var("AUDIO_DL_DEADLINE_SECS") {
            config.pipeline.deadline_secs =
                parse_env(&raw, "AUDIO_DL_DEADLINE_SECS", "a number of seconds")?;
        }

        if let Some(raw) = env_var("AUDIO_DL_ADMISSION_WAIT_MS") {
            let wait_ms: u64 =
                parse_env(&raw, "AUDIO_DL_ADMISSION_WAIT_MS", "a number of milliseconds")?;
            config.pipeline.admission = AdmissionPolicy::Wait(wait_ms);
        }

        if let Some(raw) = env_var("AUDIO_DL_EXTENSIONS") {
            let extensions: Vec<String> = raw
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
            if extensions.is_empty() {
                return Err(Error::Config {
                    message: "AUDIO_DL_EXTENSIONS must name at least one extension".to_string(),
                    key: Some("AUDIO_DL_EXTENSIONS".to_string()),
                });
            }
            config.pipeline.extensions = extensions;
        }

        if let Some(raw) = env_var("AUDIO_DL_TOOL_PATH") {
            config.pipeline.tool_path = Some(PathBuf::from(raw));
        }

        if let Some(raw) = env_var("AUDIO_DL_WORKSPACE_ROOT") {
            config.pipeline.workspace_root = Some(PathBuf::from(raw));
        }

        if let Some(raw) = env_var("AUDIO_DL_BIND_ADDRESS") {
            config.api.bind_address =
                parse_env(&raw, "AUDIO_DL_BIND_ADDRESS", "a socket address like 0.0.0.0:8000")?;
        }

        if let Some(raw) = env_var("AUDIO_DL_CORS_ORIGINS") {
            config.api.cors_origins = raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect();
        }

        Ok(config)
    }
}

/// Read an environment variable, treating empty values as unset
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

/// Parse an environment variable value, mapping failures to [`Error::Config`]
fn parse_env<T: std::str::FromStr>(raw: &str, key: &str, expected: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::Config {
        message: format!("{key} must be {expected}, got {raw:?}"),
        key: Some(key.to_string()),
    })
}

fn default_max_concurrent() -> usize {
    4
}

fn default_deadline_secs() -> u64 {
    300
}

fn default_extensions() -> Vec<String> {
    ["m4a", "webm", "opus", "mp3", "wav"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}
