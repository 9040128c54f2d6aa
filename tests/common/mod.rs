//! Common test utilities for playlist-dl integration tests:
//! in-memory catalog and stream source fakes, a pass-through transcoder,
//! and descriptor/config builders.

use async_trait::async_trait;
use playlist_dl::catalog::{CatalogClient, Playlist};
use playlist_dl::config::{Config, RetryConfig};
use playlist_dl::error::{Error, Result, SourceError, TranscodeError};
use playlist_dl::source::{EncodedAudio, Session, StreamSource};
use playlist_dl::transcode::Transcoder;
use playlist_dl::types::{AudioHandle, PlaylistId, TrackDescriptor, TrackId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Plausible MP3 frame header bytes; the tagger only needs a non-empty file
#[allow(dead_code)]
pub const FAKE_AUDIO: &[u8] = &[0xFF, 0xFB, 0x90, 0x00, 0x01, 0x02, 0x03, 0x04];

/// A config suitable for fast tests: temp output dir, no pacing delay,
/// quick jitterless retries.
#[allow(dead_code)]
pub fn test_config(base_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output.base_dir = base_dir.to_path_buf();
    config.processing.delay_between_tracks = Duration::ZERO;
    config.processing.retry = RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Descriptor builder: `handle: None` makes the track unplayable.
#[allow(dead_code)]
pub fn track(id: &str, title: &str, artist: &str, handle: Option<&str>) -> TrackDescriptor {
    TrackDescriptor {
        id: TrackId::new(id),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        album: "Test Album".to_string(),
        album_artist: None,
        disc_number: None,
        track_number: None,
        total_tracks: None,
        duration_secs: Some(180),
        release_year: Some(2020),
        isrc: None,
        cover_art_url: None,
        audio: handle.map(AudioHandle::new),
    }
}

#[allow(dead_code)]
pub fn playlist(id: &str, name: &str, tracks: Vec<TrackDescriptor>) -> Playlist {
    Playlist {
        id: PlaylistId::new(id),
        name: name.to_string(),
        tracks,
    }
}

/// In-memory catalog serving one fixed playlist (and its tracks by id).
pub struct FakeCatalog {
    playlist: Playlist,
}

#[allow(dead_code)]
impl FakeCatalog {
    pub fn new(playlist: Playlist) -> Self {
        Self { playlist }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn playlist(&self, _session: &Session, id: &PlaylistId) -> Result<Playlist> {
        if id == &self.playlist.id {
            Ok(self.playlist.clone())
        } else {
            Err(Error::Source(SourceError::Unavailable(format!(
                "no such playlist: {id}"
            ))))
        }
    }

    async fn track(&self, _session: &Session, id: &TrackId) -> Result<TrackDescriptor> {
        self.playlist
            .tracks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| Error::Source(SourceError::Unavailable(format!("no such track: {id}"))))
    }
}

/// What the fake source does when a given handle is opened.
pub enum StreamBehavior {
    /// Serve these bytes
    Bytes(Vec<u8>),
    /// Fail permanently
    Unavailable,
    /// Fail with a transient error this many times, then serve the bytes
    FlakyThenBytes { failures: u32, bytes: Vec<u8> },
}

/// In-memory stream source with per-handle behavior injection and an
/// attempt counter for asserting retry behavior.
pub struct FakeSource {
    behaviors: HashMap<AudioHandle, StreamBehavior>,
    attempts: Mutex<HashMap<AudioHandle, u32>>,
}

#[allow(dead_code, clippy::unwrap_used)]
impl FakeSource {
    pub fn new() -> Self {
        Self {
            behaviors: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_bytes(mut self, handle: &str, bytes: &[u8]) -> Self {
        self.behaviors
            .insert(AudioHandle::new(handle), StreamBehavior::Bytes(bytes.to_vec()));
        self
    }

    pub fn with_unavailable(mut self, handle: &str) -> Self {
        self.behaviors
            .insert(AudioHandle::new(handle), StreamBehavior::Unavailable);
        self
    }

    pub fn with_flaky(mut self, handle: &str, failures: u32, bytes: &[u8]) -> Self {
        self.behaviors.insert(
            AudioHandle::new(handle),
            StreamBehavior::FlakyThenBytes {
                failures,
                bytes: bytes.to_vec(),
            },
        );
        self
    }

    /// How many times `open_stream` was called for this handle
    pub fn attempts(&self, handle: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(&AudioHandle::new(handle))
            .copied()
            .unwrap_or(0)
    }
}

#[allow(clippy::unwrap_used)]
#[async_trait]
impl StreamSource for FakeSource {
    async fn authenticate(&self) -> Result<Session> {
        Ok(Session::new("test-token"))
    }

    async fn open_stream(
        &self,
        _session: &Session,
        handle: &AudioHandle,
    ) -> std::result::Result<EncodedAudio, SourceError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(handle.clone()).or_insert(0);
            *counter += 1;
            *counter
        };

        match self.behaviors.get(handle) {
            None => Err(SourceError::Unavailable(format!("no stream for {handle}"))),
            Some(StreamBehavior::Bytes(bytes)) => {
                let stream: EncodedAudio = Box::pin(std::io::Cursor::new(bytes.clone()));
                Ok(stream)
            }
            Some(StreamBehavior::Unavailable) => {
                Err(SourceError::Unavailable(format!("{handle} is gone")))
            }
            Some(StreamBehavior::FlakyThenBytes { failures, bytes }) => {
                if attempt <= *failures {
                    Err(SourceError::Transient(format!(
                        "simulated flake {attempt}/{failures}"
                    )))
                } else {
                    let stream: EncodedAudio = Box::pin(std::io::Cursor::new(bytes.clone()));
                    Ok(stream)
                }
            }
        }
    }
}

/// Pass-through transcoder: copies input bytes to the sink unchanged.
#[allow(dead_code)]
pub struct IdentityTranscoder;

#[async_trait]
impl Transcoder for IdentityTranscoder {
    async fn transcode(
        &self,
        mut input: EncodedAudio,
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> std::result::Result<(), TranscodeError> {
        tokio::io::copy(&mut input, output).await?;
        Ok(())
    }
}
