use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use super::DataGrabber;
use crate::feed::interval_to_seconds;
use crate::models::Bar;
use crate::Result;

/// Seeded random-walk bar generator for paper trading runs.
///
/// Bars are aligned to the interval grid and the final bar always lands on
/// the most recent completed boundary, so a paper session sees the same
/// freshness behavior a live provider would.
pub struct SyntheticGrabber {
    name: String,
    base_price: f64,
    rng: Mutex<StdRng>,
}

impl SyntheticGrabber {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "synthetic".to_string(),
            base_price: 150.0,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Most recent completed interval boundary at or before `now`.
    fn last_boundary(now: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
        let ts = now.timestamp() - now.timestamp().rem_euclid(interval_secs);
        Utc.timestamp_opt(ts, 0).unwrap()
    }

    fn walk(&self, start: DateTime<Utc>, interval_secs: i64, count: usize) -> Vec<Bar> {
        let mut rng = self.rng.lock().unwrap();
        let mut price = self.base_price;
        let mut bars = Vec::with_capacity(count);

        for i in 0..count {
            let drift: f64 = rng.gen_range(-0.005..0.005);
            let open = price;
            price *= 1.0 + drift;
            let close = price;
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
            let volume = rng.gen_range(500_000.0..1_500_000.0);

            bars.push(Bar {
                timestamp: start + Duration::seconds(interval_secs * i as i64),
                open,
                high,
                low,
                close,
                volume,
            });
        }
        bars
    }
}

#[async_trait]
impl DataGrabber for SyntheticGrabber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_historical(
        &self,
        _symbol: &str,
        interval: &str,
        period: &str,
    ) -> Result<Vec<Bar>> {
        let interval_secs = interval_to_seconds(interval)?;
        let period_secs = interval_to_seconds(period)?;
        let count = (period_secs / interval_secs).max(1) as usize;

        let end = Self::last_boundary(Utc::now(), interval_secs);
        let start = end - Duration::seconds(interval_secs * (count as i64 - 1));
        Ok(self.walk(start, interval_secs, count))
    }
}
