use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration};

use super::freshness::{Feed, FeedTracker, FreshnessResult};
use crate::grabber::DataGrabber;
use crate::models::Bar;

/// Per-tick go/no-go decision across all registered feeds.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Every feed was already within its interval; run the strategy against
    /// the cached frames. The common case between refresh boundaries.
    AllUpToDate,
    /// Every feed holds freshly fetched data (or a fresh/cached mix after
    /// retries); run the strategy.
    AllFresh,
    /// Retry budget exhausted with feeds still unsettled; skip the tick and
    /// try again after the delay.
    NeedsRetry(Duration),
    /// At least one feed is stale. Skip the strategy entirely; the caller
    /// should back off hard before the next tick.
    Abort(Vec<String>),
}

/// Drives repeated freshness checks across all feeds until the tick reaches
/// a consistent decision.
///
/// Fetch errors and provider lag are retried with a short backoff, only for
/// the feeds that have not yet settled. A single stale feed aborts the whole
/// tick: partial strategy execution on mixed-tier data is disallowed.
pub struct DataSyncCoordinator {
    trackers: Vec<FeedTracker>,
    retry_backoff: Duration,
    max_retries: u32,
}

impl DataSyncCoordinator {
    pub fn new(retry_backoff: Duration, max_retries: u32) -> Self {
        Self {
            trackers: Vec::new(),
            retry_backoff,
            max_retries,
        }
    }

    pub fn add_feed(&mut self, feed: Feed, grabber: Arc<dyn DataGrabber>) {
        self.trackers.push(FeedTracker::new(feed, grabber));
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    pub fn feed_names(&self) -> Vec<String> {
        self.trackers.iter().map(|t| t.feed().name.clone()).collect()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.trackers.iter().map(|t| t.feed().symbol.clone()).collect()
    }

    /// Cached frames keyed by feed name, as of the last completed sync.
    pub fn data(&self) -> HashMap<String, Vec<Bar>> {
        self.trackers
            .iter()
            .map(|t| (t.feed().name.clone(), t.data().to_vec()))
            .collect()
    }

    /// Classify every feed once, then retry the unsettled ones with a short
    /// backoff until all are UpToDate, Updated or Stale (or the retry
    /// budget runs out).
    pub async fn sync_tick(&mut self, now: DateTime<Utc>) -> SyncOutcome {
        let mut results = Vec::with_capacity(self.trackers.len());
        for tracker in &mut self.trackers {
            results.push(tracker.classify(now).await);
        }

        if results.iter().all(|r| *r == FreshnessResult::UpToDate) {
            return SyncOutcome::AllUpToDate;
        }
        if results.iter().all(|r| *r == FreshnessResult::Updated) {
            return SyncOutcome::AllFresh;
        }

        let mut rounds = 0u32;
        while results.iter().any(|r| !r.is_terminal()) {
            if rounds >= self.max_retries {
                tracing::warn!(
                    rounds,
                    "Sync retry budget exhausted with feeds still unsettled"
                );
                return SyncOutcome::NeedsRetry(self.retry_backoff);
            }
            rounds += 1;
            sleep(self.retry_backoff).await;

            for (i, tracker) in self.trackers.iter_mut().enumerate() {
                if !results[i].is_terminal() {
                    results[i] = tracker.classify(now).await;
                }
            }
        }

        let stale: Vec<String> = self
            .trackers
            .iter()
            .zip(&results)
            .filter(|(_, r)| **r == FreshnessResult::Stale)
            .map(|(t, _)| t.feed().name.clone())
            .collect();
        if !stale.is_empty() {
            return SyncOutcome::Abort(stale);
        }

        SyncOutcome::AllFresh
    }
}
