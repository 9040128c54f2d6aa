//! Core downloader implementation split into focused submodules.
//!
//! The `PlaylistDownloader` struct and its methods are organized by domain:
//! - [`orchestration`] - Playlist-level run lifecycle
//! - [`track_task`] - Per-track pipeline execution
//! - [`report`] - Ordered outcome aggregation and summary logging

mod orchestration;
mod report;
mod track_task;

pub use report::RunReport;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::source::StreamSource;
use crate::transcode::Transcoder;
use crate::types::Event;
use std::sync::Arc;

/// Size of the event broadcast buffer; slow subscribers past this lag
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct PlaylistDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Catalog metadata lookups
    pub(crate) catalog: Arc<dyn CatalogClient>,
    /// Encoded audio source (authentication + streaming)
    pub(crate) source: Arc<dyn StreamSource>,
    /// Encoded-to-target-format converter
    pub(crate) transcoder: Arc<dyn Transcoder>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Semaphore bounding concurrent track pipelines
    pub(crate) concurrent_limit: Arc<tokio::sync::Semaphore>,
    /// Run-wide cancellation: stops issuing new pipelines, in-flight ones
    /// stop at their next checkpoint
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    /// HTTP client for cover art retrieval
    pub(crate) art_client: reqwest::Client,
}

impl PlaylistDownloader {
    /// Create a new PlaylistDownloader with its own event channel.
    pub fn new(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        source: Arc<dyn StreamSource>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_events(config, catalog, source, transcoder, event_tx)
    }

    /// Create a new PlaylistDownloader sharing an existing event channel.
    ///
    /// Useful when the stream source itself emits events (e.g. the bundled
    /// HTTP adapter's device-authentication prompt).
    pub fn with_events(
        config: Config,
        catalog: Arc<dyn CatalogClient>,
        source: Arc<dyn StreamSource>,
        transcoder: Arc<dyn Transcoder>,
        event_tx: tokio::sync::broadcast::Sender<Event>,
    ) -> Self {
        let concurrent_limit = Arc::new(tokio::sync::Semaphore::new(
            config.max_concurrent_tracks(),
        ));
        Self {
            config: Arc::new(config),
            catalog,
            source,
            transcoder,
            event_tx,
            concurrent_limit,
            cancel_token: tokio_util::sync::CancellationToken::new(),
            art_client: reqwest::Client::new(),
        }
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. Events are buffered, but if a subscriber falls behind by
    /// more than the channel capacity it will receive a `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    ///
    /// The configuration is wrapped in an Arc, so this is a cheap clone.
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Request cancellation of the current run.
    ///
    /// No new track pipelines are issued; in-flight pipelines stop at their
    /// next checkpoint, delete their temp files, and report `Failed` with a
    /// "cancelled" message. No half-written file is left at a final path.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// A clone of the run's cancellation token, for wiring signal handlers.
    pub fn cancellation_token(&self) -> tokio_util::sync::CancellationToken {
        self.cancel_token.clone()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped
    /// (ok() converts Err to None). The pipeline never depends on listeners.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
