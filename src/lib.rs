//! # playlist-dl
//!
//! Backend library for downloading playlists and tracks from a streaming
//! service to local, tagged MP3 files.
//!
//! ## Design Philosophy
//!
//! playlist-dl is designed to be:
//! - **Library-first** - The CLI is a thin wrapper, everything is embeddable
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Failure-isolating** - One bad track never aborts the rest of the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use playlist_dl::{
//!     Config, CredentialCache, FfmpegTranscoder, HttpService, PlaylistDownloader,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         service: playlist_dl::config::ServiceConfig {
//!             api_base_url: Some("https://gateway.example.com".to_string()),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let (event_tx, _) = tokio::sync::broadcast::channel(1000);
//!     let credentials = Arc::new(CredentialCache::new(&config.service)?);
//!     let service = Arc::new(HttpService::new(&config.service, credentials, event_tx.clone())?);
//!     let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcode)?);
//!     let downloader = PlaylistDownloader::with_events(
//!         config,
//!         service.clone(),
//!         service,
//!         transcoder,
//!         event_tx,
//!     );
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {event:?}");
//!         }
//!     });
//!
//!     let report = downloader
//!         .run("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M")
//!         .await?;
//!     println!("{} tracks downloaded", report.succeeded());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog metadata seam
pub mod catalog;
/// Configuration types
pub mod config;
/// Credential cache persistence
pub mod credentials;
/// Destination planning and collision handling
pub mod destination;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Identifier resolution (URIs and share URLs)
pub mod resolver;
/// Retry logic with exponential backoff
pub mod retry;
/// Streaming service HTTP adapter
pub mod service;
/// Stream source seam
pub mod source;
/// Metadata tagging
pub mod tagger;
/// Audio transcoding
pub mod transcode;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use catalog::{CatalogClient, Playlist};
pub use config::{Config, FileCollisionAction, RetryConfig};
pub use credentials::CredentialCache;
pub use downloader::{PlaylistDownloader, RunReport};
pub use error::{Error, Result, SourceError, TagError, TranscodeError};
pub use service::HttpService;
pub use source::{EncodedAudio, Session, StreamSource};
pub use tagger::CoverArt;
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use types::{
    AudioHandle, DownloadOutcome, Event, ItemRef, OutcomeStatus, PlaylistId, SkipReason,
    TrackDescriptor, TrackId, TrackStage,
};

/// Run a download with graceful signal handling.
///
/// A termination signal cancels the run: no new tracks start, in-flight
/// tracks stop at their next checkpoint, and the report covers every track.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use playlist_dl::{
///     Config, CredentialCache, FfmpegTranscoder, HttpService, PlaylistDownloader,
///     run_with_shutdown,
/// };
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let (event_tx, _) = tokio::sync::broadcast::channel(1000);
///     let credentials = Arc::new(CredentialCache::new(&config.service)?);
///     let service = Arc::new(HttpService::new(&config.service, credentials, event_tx.clone())?);
///     let transcoder = Arc::new(FfmpegTranscoder::from_config(&config.transcode)?);
///     let downloader =
///         PlaylistDownloader::with_events(config, service.clone(), service, transcoder, event_tx);
///
///     let report = run_with_shutdown(&downloader, "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M").await?;
///     println!("{} downloaded, {} failed", report.succeeded(), report.failed());
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(downloader: &PlaylistDownloader, input: &str) -> Result<RunReport> {
    let cancel = downloader.cancellation_token();
    let watcher = tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });

    let report = downloader.run(input).await;
    watcher.abort();
    report
}

#[cfg(unix)]
async fn wait_for_signal() {
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
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
