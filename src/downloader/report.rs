//! Run report: per-track outcomes in playlist order plus summary logging.

use crate::types::{DownloadOutcome, OutcomeStatus};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// The result of one complete run, with outcomes in playlist order.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Per-track outcomes, index 1..=N in playlist order
    pub outcomes: Vec<DownloadOutcome>,
    /// Directory the run placed files into
    pub output_dir: PathBuf,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub(crate) fn new(
        outcomes: Vec<DownloadOutcome>,
        output_dir: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            outcomes,
            output_dir,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Number of tracks downloaded and placed
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of tracks skipped (already downloaded or unplayable)
    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// Number of tracks that failed
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// True when the run had tracks and every single one failed.
    ///
    /// Partial failure is a normal outcome; total failure usually means a
    /// systemic problem (expired session, missing ffmpeg, network down).
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == self.outcomes.len()
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Log a human-oriented summary: one line of counts, one warning per
    /// failed track with enough context to retry it individually.
    pub(crate) fn log_summary(&self) {
        tracing::info!(
            skipped = self.skipped(),
            failed = self.failed(),
            output_dir = %self.output_dir.display(),
            "Downloaded {}/{} tracks in {} seconds",
            self.succeeded(),
            self.outcomes.len(),
            self.elapsed().num_seconds(),
        );
        for outcome in &self.outcomes {
            if let OutcomeStatus::Failed { error } = &outcome.status {
                tracing::warn!(
                    index = outcome.index,
                    track_id = %outcome.track_id,
                    title = %outcome.title,
                    error = %error,
                    "Track was not downloaded"
                );
            }
        }
    }
}
