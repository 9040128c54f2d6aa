//! Core types for playlist-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a playlist (opaque service-defined ID)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    /// Create a new PlaylistId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a track (opaque service-defined ID)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    /// Create a new TrackId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle that the stream source exchanges for encoded audio bytes
///
/// Produced by the catalog for each track; already re-linked to an alternative
/// recording where the service applies one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioHandle(pub String);

impl AudioHandle {
    /// Create a new AudioHandle
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the inner handle string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AudioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed reference produced by the identifier resolver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ItemRef {
    /// A playlist reference
    Playlist(PlaylistId),
    /// A single track reference
    Track(TrackId),
}

/// Metadata for one track, as returned by the catalog
///
/// Absent optional fields never fail the pipeline; they only omit the
/// corresponding tag. `track_number` is 1-based when present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    /// Track identifier
    pub id: TrackId,
    /// Track title
    pub title: String,
    /// Performing artists, in credited order
    pub artists: Vec<String>,
    /// Album title
    pub album: String,
    /// Album-level artist (used for the album-artist tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    /// Disc number (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u32>,
    /// Track number within the album (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_number: Option<u32>,
    /// Total tracks on the album
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tracks: Option<u32>,
    /// Track duration in whole seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    /// Release year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    /// International Standard Recording Code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    /// URL of the cover art image, if the album has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art_url: Option<String>,
    /// Handle for streaming the track's encoded audio; None means the track
    /// is unplayable (no file and no re-linked alternative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioHandle>,
}

impl TrackDescriptor {
    /// Primary credited artist, if any
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// Why a track was skipped without any download work
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The destination file already exists and is deemed complete
    AlreadyDownloaded,
    /// The catalog reports no streamable audio for this track
    Unplayable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyDownloaded => write!(f, "already-downloaded"),
            SkipReason::Unplayable => write!(f, "unplayable"),
        }
    }
}

/// Final status of one track's pipeline execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The track was downloaded, tagged, and placed at `path`
    Success {
        /// Final destination path of the tagged file
        path: PathBuf,
    },
    /// No download work was performed
    Skipped {
        /// Why the track was skipped
        reason: SkipReason,
    },
    /// The pipeline failed for this track only
    Failed {
        /// Human-readable error with enough context to retry individually
        error: String,
    },
}

/// Outcome of one track's pipeline, recorded in playlist order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// 1-based position in the playlist
    pub index: usize,
    /// Track identifier
    pub track_id: TrackId,
    /// Track title (for reporting)
    pub title: String,
    /// Final status
    pub status: OutcomeStatus,
}

impl DownloadOutcome {
    /// True if the track was downloaded and placed
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success { .. })
    }

    /// True if the track was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    /// True if the track failed
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

/// Per-track pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStage {
    /// Waiting for a worker slot
    Pending,
    /// Computing the destination and checking for prior downloads
    Resolving,
    /// Pulling encoded audio from the stream source
    Fetching,
    /// Converting to the target format
    Transcoding,
    /// Writing metadata tags
    Tagging,
    /// Moving the finished file to its final name
    Placing,
    /// Finished successfully
    Done,
    /// Skipped without download work
    Skipped,
    /// Failed permanently
    Failed,
}

impl std::fmt::Display for TrackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackStage::Pending => "pending",
            TrackStage::Resolving => "resolving",
            TrackStage::Fetching => "fetching",
            TrackStage::Transcoding => "transcoding",
            TrackStage::Tagging => "tagging",
            TrackStage::Placing => "placing",
            TrackStage::Done => "done",
            TrackStage::Skipped => "skipped",
            TrackStage::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Events broadcast by the downloader
///
/// Subscribe via [`crate::downloader::PlaylistDownloader::subscribe`]. Events are
/// fire-and-forget; slow subscribers may observe lagged receives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A playlist (or single-track) run has started
    PlaylistStarted {
        /// Playlist identifier (None for single-track runs)
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<PlaylistId>,
        /// Display name of the playlist, or the track's file stem
        name: String,
        /// Number of tracks in the run
        total_tracks: usize,
    },

    /// A track moved to a new pipeline stage
    TrackStage {
        /// 1-based position in the playlist
        index: usize,
        /// Track identifier
        id: TrackId,
        /// The stage just entered
        stage: TrackStage,
    },

    /// Device authentication requires the user to visit a URL
    AuthenticationRequired {
        /// URL the user must open
        verification_url: String,
        /// Code the user must enter
        user_code: String,
    },

    /// A track finished successfully
    TrackComplete {
        /// 1-based position in the playlist
        index: usize,
        /// Track identifier
        id: TrackId,
        /// Track title
        title: String,
        /// Final destination path
        path: PathBuf,
    },

    /// A track was skipped without download work
    TrackSkipped {
        /// 1-based position in the playlist
        index: usize,
        /// Track identifier
        id: TrackId,
        /// Track title
        title: String,
        /// Why the track was skipped
        reason: SkipReason,
    },

    /// A track failed permanently
    TrackFailed {
        /// 1-based position in the playlist
        index: usize,
        /// Track identifier
        id: TrackId,
        /// Track title
        title: String,
        /// Error message
        error: String,
    },

    /// The run finished; per-track counts
    PlaylistComplete {
        /// Tracks downloaded and placed
        succeeded: usize,
        /// Tracks skipped
        skipped: usize,
        /// Tracks failed
        failed: usize,
    },
}
