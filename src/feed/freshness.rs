use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use super::interval_to_seconds;
use crate::grabber::DataGrabber;
use crate::models::Bar;
use crate::Result;

/// One (symbol, interval, period) data subscription.
///
/// `last_update` starts at an epoch far in the past so the first
/// classification always fetches.
#[derive(Debug, Clone)]
pub struct Feed {
    pub name: String,
    pub symbol: String,
    pub interval: String,
    pub period: String,
    pub last_update: DateTime<Utc>,
    interval_secs: i64,
}

impl Feed {
    /// Build a feed named after its symbol. Fails on a malformed interval,
    /// so a bad config never reaches the loop.
    pub fn new(symbol: &str, interval: &str, period: &str) -> Result<Self> {
        let interval_secs = interval_to_seconds(interval)?;
        Ok(Self {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            period: period.to_string(),
            last_update: Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap(),
            interval_secs,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }
}

/// How recently a feed's data was refreshed relative to its expected
/// update cadence, classified once per feed per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessResult {
    /// Interval has not elapsed since the last refresh; no fetch performed.
    UpToDate,
    /// Fetched and the latest row is within one interval of now.
    Updated,
    /// Fetched, but the latest row lags by one to two intervals. Provider
    /// lag; worth retrying within the tick.
    UpdatedButLate,
    /// Latest row is at least two intervals old. Data is old enough to
    /// distrust.
    Stale,
    /// Fetch failed or returned zero rows; retryable within the tick.
    FetchError,
}

impl FreshnessResult {
    /// Terminal classifications end the per-tick retry loop for a feed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FreshnessResult::UpToDate | FreshnessResult::Updated | FreshnessResult::Stale
        )
    }
}

/// Tracks one feed's freshness and caches its latest fetched frame.
pub struct FeedTracker {
    feed: Feed,
    grabber: Arc<dyn DataGrabber>,
    data: Vec<Bar>,
}

impl FeedTracker {
    pub fn new(feed: Feed, grabber: Arc<dyn DataGrabber>) -> Self {
        Self {
            feed,
            grabber,
            data: Vec::new(),
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    /// Latest fetched frame; empty until the first successful fetch.
    pub fn data(&self) -> &[Bar] {
        &self.data
    }

    /// Classify this feed's freshness at `now`, fetching only when the
    /// interval has elapsed since the last refresh.
    ///
    /// On a successful fetch `last_update` advances to the latest row
    /// timestamp and the cached frame is replaced. A failed or empty fetch
    /// leaves both untouched.
    pub async fn classify(&mut self, now: DateTime<Utc>) -> FreshnessResult {
        let interval = self.feed.interval_secs;
        let age = (now - self.feed.last_update).num_seconds();
        if age < interval {
            return FreshnessResult::UpToDate;
        }

        let rows = match self
            .grabber
            .fetch_historical(&self.feed.symbol, &self.feed.interval, &self.feed.period)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(feed = %self.feed.name, error = %e, "Fetch failed");
                return FreshnessResult::FetchError;
            }
        };
        let Some(latest) = rows.last() else {
            tracing::error!(feed = %self.feed.name, "Getting data error. No data retrieved.");
            return FreshnessResult::FetchError;
        };

        self.feed.last_update = latest.timestamp.with_timezone(&Utc);
        self.data = rows;

        let age = (now - self.feed.last_update).num_seconds();
        if age < interval {
            FreshnessResult::Updated
        } else if age < 2 * interval {
            tracing::warn!(
                feed = %self.feed.name,
                last_update = %self.feed.last_update,
                "Data is not updated yet"
            );
            FreshnessResult::UpdatedButLate
        } else {
            tracing::error!(
                feed = %self.feed.name,
                last_update = %self.feed.last_update,
                "Data is too old"
            );
            FreshnessResult::Stale
        }
    }
}
