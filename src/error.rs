//! Error types for playlist-dl
//!
//! This module provides the error handling for the library, including:
//! - Run-level errors that abort before any track work begins (identifier, auth, config)
//! - Track-level error types (Source, Transcode, TagWrite) that stay isolated per track
//! - Retryability classification lives in [`crate::retry`]

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for playlist-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api_base_url")
        key: Option<String>,
    },

    /// Input matched neither a playlist nor a track URI/URL shape
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Could not establish an authenticated session; fatal for the whole run
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Stream source error (track-level)
    #[error("stream source error: {0}")]
    Source(#[from] SourceError),

    /// Transcoding error (track-level)
    #[error("transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Tag writing error (track-level)
    #[error("tag write error: {0}")]
    TagWrite(#[from] TagError),

    /// Destination planning failed for a path
    #[error("destination error at {path}: {reason}")]
    Destination {
        /// The path that could not be planned or created
        path: PathBuf,
        /// The reason planning failed
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Run was cancelled before this operation could start or finish
    #[error("cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Stream source errors (the track-level taxonomy)
///
/// `Transient` is the only retryable variant; `Unavailable` and `Unauthorized` are
/// permanent for the affected track and never retried.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The track has no streamable audio (removed, region-locked, expired)
    #[error("track unavailable: {0}")]
    Unavailable(String),

    /// The session is not permitted to stream this track
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Network-level failure (timeout, disconnect, server overload)
    #[error("transient failure: {0}")]
    Transient(String),
}

/// Transcoding errors
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The transcoder binary could not be located
    #[error("transcoder binary not found: {0}")]
    BinaryNotFound(String),

    /// The transcoder process exited unsuccessfully
    #[error("transcoder exited with {status}: {stderr}")]
    ProcessFailed {
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error output
        stderr: String,
    },

    /// The encoded input stream died mid-transfer. The transcoder may still
    /// exit cleanly on the truncated input, so this is tracked separately
    /// from the exit status.
    #[error("input stream failed during transcode: {0}")]
    Input(std::io::Error),

    /// I/O error while streaming bytes to or from the transcoder
    #[error("transcoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tag writing errors
#[derive(Debug, Error)]
pub enum TagError {
    /// The file is not a valid container for the target tag format
    #[error("not a valid audio container: {path}")]
    InvalidContainer {
        /// The file that could not hold a tag
        path: PathBuf,
    },

    /// Writing the tag failed
    #[error("failed to write tags to {path}: {reason}")]
    WriteFailed {
        /// The file the tag was being written to
        path: PathBuf,
        /// The underlying failure
        reason: String,
    },
}
