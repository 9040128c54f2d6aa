//! Configuration types for playlist-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Output placement configuration (base directory, naming, collisions)
///
/// Groups settings related to where finished files land and how name
/// collisions are handled. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory (default: the platform downloads directory,
    /// falling back to "./downloads")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Maximum length of a generated file name in characters (default: 255)
    ///
    /// Names longer than this are truncated before the extension is appended.
    #[serde(default = "default_max_file_name_len")]
    pub max_file_name_len: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            file_collision: FileCollisionAction::default(),
            max_file_name_len: default_max_file_name_len(),
        }
    }
}

/// Streaming service gateway configuration
///
/// Groups settings for the bundled HTTP adapter and the credential cache.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the streaming service gateway (required for the bundled
    /// HTTP adapter, e.g. "https://gateway.example.com")
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Override for the credential cache file location
    /// (default: "credentials.json" in the platform cache directory)
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

/// Transcoder configuration (ffmpeg discovery and encoding quality)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Constant bitrate in kbit/s (None = best-quality VBR)
    #[serde(default)]
    pub bitrate_kbps: Option<u32>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
            bitrate_kbps: None,
        }
    }
}

/// Pipeline processing configuration (retries, concurrency, pacing)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Retry behavior for transient stream source failures. Flattened so the
    /// retry knobs sit at the top level of the serialized form like every
    /// other field; missing keys fall back to the per-field defaults.
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// Maximum concurrent track pipelines (default: 1)
    #[serde(default = "default_max_concurrent_tracks")]
    pub max_concurrent_tracks: usize,

    /// Courtesy delay after each successful download before starting the next
    /// track (default: 5 seconds; 0 disables). Not applied after failures,
    /// skips, or the final track.
    #[serde(default = "default_delay_between_tracks", with = "duration_serde")]
    pub delay_between_tracks: Duration,

    /// Treat a run where every track failed as a process-level error
    /// (default: true). Partial failure never affects the exit code.
    #[serde(default = "default_true")]
    pub all_failed_is_error: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_concurrent_tracks: default_max_concurrent_tracks(),
            delay_between_tracks: default_delay_between_tracks(),
            all_failed_is_error: true,
        }
    }
}

/// Main configuration for PlaylistDownloader
///
/// Fields are organized into logical sub-configs for maintainability:
/// - [`output`](OutputConfig) — placement, naming, collision handling
/// - [`service`](ServiceConfig) — gateway URL and credential cache location
/// - [`transcode`](TranscodeConfig) — ffmpeg discovery and quality
/// - [`processing`](ProcessingConfig) — retries, concurrency, pacing
///
/// All sub-config fields are flattened for backward-compatible serialization,
/// meaning the JSON/TOML format remains unchanged (no nesting).
/// Individual fields are also accessible directly on `Config` via `Deref`-style
/// accessor methods for convenience.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output placement settings
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Streaming service gateway settings
    #[serde(flatten)]
    pub service: ServiceConfig,

    /// Transcoder settings
    #[serde(flatten)]
    pub transcode: TranscodeConfig,

    /// Pipeline processing settings
    #[serde(flatten)]
    pub processing: ProcessingConfig,
}

// Convenience accessors — allow call sites to use `config.base_dir()` etc.
// without reaching through the sub-config structs.
impl Config {
    /// Base output directory
    pub fn base_dir(&self) -> &PathBuf {
        &self.output.base_dir
    }

    /// Retry configuration
    pub fn retry(&self) -> &RetryConfig {
        &self.processing.retry
    }

    /// Maximum concurrent track pipelines
    pub fn max_concurrent_tracks(&self) -> usize {
        self.processing.max_concurrent_tracks.max(1)
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// File collision handling strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to filename (default)
    #[default]
    Rename,
    /// Overwrite existing file
    Overwrite,
    /// Skip the file, keep existing
    Skip,
}

// Default value functions for serde

fn default_base_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

fn default_max_file_name_len() -> usize {
    255
}

fn default_max_concurrent_tracks() -> usize {
    1
}

fn default_delay_between_tracks() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

/// Serde support for Duration as seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
