//! Per-track pipeline: skip checks, fetch + transcode with retry, tag, and
//! atomic placement.
//!
//! Every attempt writes into a fresh temp file inside the destination
//! directory; the final name only ever appears via rename after tagging
//! succeeded. Temp files are deleted on any failure path via `NamedTempFile`'s
//! drop guard.

use super::PlaylistDownloader;
use crate::destination;
use crate::error::{Error, Result};
use crate::retry::download_with_retry;
use crate::service;
use crate::source::Session;
use crate::tagger;
use crate::types::{
    AudioHandle, DownloadOutcome, Event, OutcomeStatus, SkipReason, TrackDescriptor, TrackStage,
};
use std::path::{Path, PathBuf};

/// Everything one track pipeline needs, owned so it can move into a task.
pub(crate) struct TrackTaskContext {
    /// 1-based position in the playlist (1 for single-track runs)
    pub(crate) index: usize,
    /// Number of tracks in the run (for the courtesy delay cutoff)
    pub(crate) total: usize,
    pub(crate) descriptor: TrackDescriptor,
    /// Pre-assigned deterministic file name, including extension
    pub(crate) file_name: String,
    /// Destination directory (already created and claimed)
    pub(crate) dest_dir: PathBuf,
    pub(crate) session: Session,
    pub(crate) downloader: PlaylistDownloader,
}

impl TrackTaskContext {
    fn stage(&self, stage: TrackStage) {
        self.downloader.emit_event(Event::TrackStage {
            index: self.index,
            id: self.descriptor.id.clone(),
            stage,
        });
    }

    fn skip(&self, reason: SkipReason) -> DownloadOutcome {
        self.stage(TrackStage::Skipped);
        self.downloader.emit_event(Event::TrackSkipped {
            index: self.index,
            id: self.descriptor.id.clone(),
            title: self.descriptor.title.clone(),
            reason,
        });
        DownloadOutcome {
            index: self.index,
            track_id: self.descriptor.id.clone(),
            title: self.descriptor.title.clone(),
            status: OutcomeStatus::Skipped { reason },
        }
    }
}

/// Run the full pipeline for one track. Never panics the run: every error is
/// converted into a `Failed` outcome.
pub(crate) async fn run_track(ctx: TrackTaskContext) -> DownloadOutcome {
    ctx.stage(TrackStage::Resolving);
    let final_path = ctx.dest_dir.join(&ctx.file_name);

    // Idempotent re-run: a file already at the final name counts as done.
    // Temp files never match because they never carry the final name.
    if final_path.exists() {
        tracing::debug!(
            index = ctx.index,
            path = %final_path.display(),
            "Track already downloaded, skipping"
        );
        return ctx.skip(SkipReason::AlreadyDownloaded);
    }

    let Some(audio) = ctx.descriptor.audio.clone() else {
        tracing::info!(
            index = ctx.index,
            track_id = %ctx.descriptor.id,
            title = %ctx.descriptor.title,
            "Track has no streamable audio, skipping"
        );
        return ctx.skip(SkipReason::Unplayable);
    };

    match execute(&ctx, &audio, &final_path).await {
        Ok(path) => {
            ctx.stage(TrackStage::Done);
            tracing::info!(
                index = ctx.index,
                track_id = %ctx.descriptor.id,
                title = %ctx.descriptor.title,
                path = %path.display(),
                "Track complete"
            );
            ctx.downloader.emit_event(Event::TrackComplete {
                index: ctx.index,
                id: ctx.descriptor.id.clone(),
                title: ctx.descriptor.title.clone(),
                path: path.clone(),
            });

            courtesy_delay(&ctx).await;

            DownloadOutcome {
                index: ctx.index,
                track_id: ctx.descriptor.id.clone(),
                title: ctx.descriptor.title.clone(),
                status: OutcomeStatus::Success { path },
            }
        }
        Err(e) => {
            ctx.stage(TrackStage::Failed);
            tracing::error!(
                index = ctx.index,
                track_id = %ctx.descriptor.id,
                title = %ctx.descriptor.title,
                error = %e,
                "Track failed"
            );
            let error = e.to_string();
            ctx.downloader.emit_event(Event::TrackFailed {
                index: ctx.index,
                id: ctx.descriptor.id.clone(),
                title: ctx.descriptor.title.clone(),
                error: error.clone(),
            });
            DownloadOutcome {
                index: ctx.index,
                track_id: ctx.descriptor.id.clone(),
                title: ctx.descriptor.title.clone(),
                status: OutcomeStatus::Failed { error },
            }
        }
    }
}

/// Fetch, transcode, tag, and place one track.
async fn execute(
    ctx: &TrackTaskContext,
    audio: &AudioHandle,
    final_path: &Path,
) -> Result<PathBuf> {
    let dl = &ctx.downloader;

    // Fetch + transcode is the retryable section. Each attempt opens a fresh
    // stream and writes into a fresh temp file; a failed attempt's temp file
    // is deleted when the NamedTempFile drops.
    let temp = download_with_retry(dl.config.retry(), || async move {
        if dl.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        ctx.stage(TrackStage::Fetching);
        let encoded = dl
            .source
            .open_stream(&ctx.session, audio)
            .await
            .map_err(Error::Source)?;

        ctx.stage(TrackStage::Transcoding);
        let temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".part")
            .tempfile_in(&ctx.dest_dir)?;
        let mut sink = tokio::fs::File::from_std(temp.reopen()?);
        dl.transcoder
            .transcode(encoded, &mut sink)
            .await
            .map_err(Error::Transcode)?;
        // Flush to disk before the rename makes the file visible
        sink.sync_all().await?;
        drop(sink);

        Ok(temp)
    })
    .await?;

    ctx.stage(TrackStage::Tagging);
    let art = match &ctx.descriptor.cover_art_url {
        Some(url) => match service::fetch_cover_art(&dl.art_client, url).await {
            Ok(art) => Some(art),
            // Art is decorative; the track is still a valid deliverable
            Err(e) => {
                tracing::warn!(
                    track_id = %ctx.descriptor.id,
                    url,
                    error = %e,
                    "Cover art fetch failed, tagging without art"
                );
                None
            }
        },
        None => None,
    };
    tagger::tag_file(temp.path(), &ctx.descriptor, art.as_ref())?;

    ctx.stage(TrackStage::Placing);
    let target = destination::get_unique_path(final_path, dl.config.output.file_collision)?;
    temp.persist(&target).map_err(|e| Error::Io(e.error))?;
    Ok(target)
}

/// Pacing between tracks: sleep after a success while still holding the
/// worker permit. Skipped after the final track, and interrupted immediately
/// by cancellation (the track itself already succeeded at this point).
async fn courtesy_delay(ctx: &TrackTaskContext) {
    let delay = ctx.downloader.config.processing.delay_between_tracks;
    if delay.is_zero() || ctx.index >= ctx.total {
        return;
    }
    tokio::select! {
        _ = ctx.downloader.cancel_token.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
