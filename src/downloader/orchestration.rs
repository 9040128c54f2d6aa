//! Playlist-level run lifecycle: resolve the input, authenticate, plan the
//! output directory, and drive per-track pipelines through the worker pool.

use super::PlaylistDownloader;
use super::report::RunReport;
use super::track_task::{self, TrackTaskContext};
use crate::destination;
use crate::error::{Error, Result};
use crate::resolver;
use crate::source::Session;
use crate::types::{
    DownloadOutcome, Event, ItemRef, OutcomeStatus, PlaylistId, TrackDescriptor, TrackId,
};
use std::path::PathBuf;

/// A track pipeline that is either running or was never issued.
///
/// Cancellation between issue steps produces `NotStarted` entries so the
/// final report still covers every track in playlist order.
enum TrackHandle {
    Spawned {
        index: usize,
        track_id: TrackId,
        title: String,
        handle: tokio::task::JoinHandle<DownloadOutcome>,
    },
    NotStarted(DownloadOutcome),
}

impl PlaylistDownloader {
    /// Run a full download for one playlist or track URI/URL.
    ///
    /// Resolves `input`, authenticates once, then downloads every track. Track
    /// failures are isolated (recorded in the report, remaining tracks still
    /// run); only resolution, authentication, and playlist metadata fetch
    /// failures abort the run as a whole.
    pub async fn run(&self, input: &str) -> Result<RunReport> {
        let item = resolver::resolve(input)?;
        let session = self.source.authenticate().await?;

        match item {
            ItemRef::Playlist(id) => self.run_playlist(&session, &id).await,
            ItemRef::Track(id) => self.run_single_track(&session, &id).await,
        }
    }

    async fn run_playlist(&self, session: &Session, id: &PlaylistId) -> Result<RunReport> {
        let started_at = chrono::Utc::now();
        let playlist = self.catalog.playlist(session, id).await?;
        let dest_dir = destination::plan_playlist_dir(
            self.config.base_dir(),
            &playlist.name,
            &playlist.id,
            self.config.output.max_file_name_len,
        )?;

        tracing::info!(
            playlist_id = %playlist.id,
            name = %playlist.name,
            dir = %dest_dir.display(),
            tracks = playlist.tracks.len(),
            "Starting playlist download"
        );
        self.emit_event(Event::PlaylistStarted {
            id: Some(playlist.id.clone()),
            name: playlist.name.clone(),
            total_tracks: playlist.tracks.len(),
        });

        // File names are assigned up front so duplicate titles disambiguate
        // deterministically and the already-downloaded check stays stable
        // across re-runs.
        let file_names =
            destination::assign_track_names(&playlist.tracks, self.config.output.max_file_name_len);
        let total = playlist.tracks.len();

        let mut handles: Vec<TrackHandle> = Vec::with_capacity(total);
        for (i, (descriptor, file_name)) in
            playlist.tracks.into_iter().zip(file_names).enumerate()
        {
            let index = i + 1;
            if self.cancel_token.is_cancelled() {
                handles.push(TrackHandle::NotStarted(cancelled_outcome(index, &descriptor)));
                continue;
            }

            self.emit_event(Event::TrackStage {
                index,
                id: descriptor.id.clone(),
                stage: crate::types::TrackStage::Pending,
            });

            // Wait for a worker slot; cancellation during the wait turns this
            // and every later track into a not-started failure.
            let permit = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    handles.push(TrackHandle::NotStarted(cancelled_outcome(index, &descriptor)));
                    continue;
                }
                permit = self.concurrent_limit.clone().acquire_owned() => {
                    match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            handles.push(TrackHandle::NotStarted(cancelled_outcome(index, &descriptor)));
                            continue;
                        }
                    }
                }
            };

            let ctx = TrackTaskContext {
                index,
                total,
                descriptor: descriptor.clone(),
                file_name,
                dest_dir: dest_dir.clone(),
                session: session.clone(),
                downloader: self.clone(),
            };
            handles.push(TrackHandle::Spawned {
                index,
                track_id: descriptor.id,
                title: descriptor.title,
                handle: tokio::spawn(async move {
                    // The permit is held for the whole pipeline, including the
                    // courtesy delay after a success.
                    let _permit = permit;
                    track_task::run_track(ctx).await
                }),
            });
        }

        // Collect in issue order, which is playlist order.
        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle {
                TrackHandle::Spawned {
                    index,
                    track_id,
                    title,
                    handle,
                } => match handle.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        tracing::error!(index, track_id = %track_id, error = %e, "Track task aborted");
                        outcomes.push(DownloadOutcome {
                            index,
                            track_id,
                            title,
                            status: OutcomeStatus::Failed {
                                error: format!("task aborted: {e}"),
                            },
                        });
                    }
                },
                TrackHandle::NotStarted(outcome) => outcomes.push(outcome),
            }
        }

        self.finish_run(outcomes, dest_dir, started_at)
    }

    async fn run_single_track(&self, session: &Session, id: &TrackId) -> Result<RunReport> {
        let started_at = chrono::Utc::now();
        let descriptor = self.catalog.track(session, id).await?;

        // Single tracks land directly in the base directory, without an index
        // prefix in the name.
        let dest_dir = self.config.base_dir().clone();
        std::fs::create_dir_all(&dest_dir)?;
        let file_name =
            destination::track_file_name(&descriptor, None, self.config.output.max_file_name_len);

        tracing::info!(
            track_id = %descriptor.id,
            title = %descriptor.title,
            dir = %dest_dir.display(),
            "Starting single track download"
        );
        self.emit_event(Event::PlaylistStarted {
            id: None,
            name: file_name.trim_end_matches(".mp3").to_string(),
            total_tracks: 1,
        });

        let outcome = if self.cancel_token.is_cancelled() {
            cancelled_outcome(1, &descriptor)
        } else {
            let ctx = TrackTaskContext {
                index: 1,
                total: 1,
                descriptor,
                file_name,
                dest_dir: dest_dir.clone(),
                session: session.clone(),
                downloader: self.clone(),
            };
            track_task::run_track(ctx).await
        };

        self.finish_run(vec![outcome], dest_dir, started_at)
    }

    fn finish_run(
        &self,
        outcomes: Vec<DownloadOutcome>,
        output_dir: PathBuf,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<RunReport> {
        let report = RunReport::new(outcomes, output_dir, started_at);
        report.log_summary();
        self.emit_event(Event::PlaylistComplete {
            succeeded: report.succeeded(),
            skipped: report.skipped(),
            failed: report.failed(),
        });
        Ok(report)
    }
}

/// Outcome for a track whose pipeline was never issued due to cancellation
fn cancelled_outcome(index: usize, descriptor: &TrackDescriptor) -> DownloadOutcome {
    DownloadOutcome {
        index,
        track_id: descriptor.id.clone(),
        title: descriptor.title.clone(),
        status: OutcomeStatus::Failed {
            error: Error::Cancelled.to_string(),
        },
    }
}
