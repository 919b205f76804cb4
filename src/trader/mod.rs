use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use tokio::time::sleep;

use crate::broker::Broker;
use crate::config::TraderConfig;
use crate::error::TradingError;
use crate::feed::{DataSyncCoordinator, Feed, SyncOutcome};
use crate::grabber::DataGrabber;
use crate::orders::OrderLifecycleManager;
use crate::strategy::Strategy;
use crate::Result;

/// Tick-level state of the trading loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingWindow,
    Syncing,
    Deciding,
    Submitting,
    EndOfDayLiquidation,
    Stopped,
}

/// Signals the loop to stop at the next tick boundary.
#[derive(Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// The top-level intraday scheduler.
///
/// Each tick it gates on the trading window, drives all feeds to a
/// consistent freshness decision, invokes the strategy when the data is
/// trustworthy and forwards the resulting instructions to the order
/// lifecycle manager. One logical control task owns all mutable feed and
/// order state; the only suspension points are the sleeps between ticks
/// and the network calls themselves, so ticks never overlap.
pub struct Trader {
    config: TraderConfig,
    broker: Option<Arc<dyn Broker>>,
    strategy: Option<Box<dyn Strategy>>,
    coordinator: DataSyncCoordinator,
    state: LoopState,
    stop_flag: Arc<AtomicBool>,
}

impl Trader {
    pub fn new(config: TraderConfig) -> Self {
        let coordinator =
            DataSyncCoordinator::new(config.retry_backoff, config.max_sync_retries);
        Self {
            config,
            broker: None,
            strategy: None,
            coordinator,
            state: LoopState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_broker(&mut self, broker: Arc<dyn Broker>) {
        self.broker = Some(broker);
    }

    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = Some(strategy);
    }

    pub fn add_feed(&mut self, feed: Feed, grabber: Arc<dyn DataGrabber>) {
        self.coordinator.add_feed(feed, grabber);
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop_flag.clone())
    }

    /// Validate the setup, connect the broker, prime the feeds and run the
    /// loop until end of day or an external stop. Missing broker, strategy
    /// or feeds fail fast here, before any tick runs.
    pub async fn start(&mut self) -> Result<()> {
        let broker = self.broker.clone().ok_or_else(|| {
            TradingError::Setup("broker is not set yet, set with set_broker()".into())
        })?;
        let strategy = self.strategy.take().ok_or_else(|| {
            TradingError::Setup("strategy is not set yet, set with set_strategy()".into())
        })?;
        if self.coordinator.is_empty() {
            return Err(TradingError::Setup(
                "no data feed, add one with add_feed()".into(),
            ));
        }

        tracing::info!("Initializing broker...");
        broker.start().await?;

        tracing::info!(feeds = ?self.coordinator.feed_names(), "Priming feeds...");
        self.coordinator.sync_tick(broker.now()).await;

        let orders = OrderLifecycleManager::new(broker.clone(), self.config.cancel_delay);
        self.run(broker, strategy, orders).await
    }

    async fn run(
        &mut self,
        broker: Arc<dyn Broker>,
        strategy: Box<dyn Strategy>,
        mut orders: OrderLifecycleManager,
    ) -> Result<()> {
        loop {
            if self.stop_flag.load(Ordering::SeqCst) {
                tracing::info!("Stop requested");
                self.state = LoopState::Stopped;
                return Ok(());
            }

            let now = broker.now();
            tracing::debug!(%now, "Tick");

            if now.hour() == self.config.eod_hour && now.minute() == self.config.eod_minute {
                self.liquidate(&broker, &mut orders).await;
                return Ok(());
            }

            if in_action_window(now, self.config.action_window_secs) {
                self.state = LoopState::Syncing;
                match self.coordinator.sync_tick(now).await {
                    SyncOutcome::AllUpToDate | SyncOutcome::AllFresh => {
                        self.decide_and_submit(strategy.as_ref(), &broker, &mut orders)
                            .await;
                    }
                    SyncOutcome::Abort(feeds) => {
                        tracing::error!(
                            ?feeds,
                            backoff_secs = self.config.stale_backoff.as_secs(),
                            "Stale feeds, skipping tick"
                        );
                        sleep(self.config.stale_backoff).await;
                    }
                    SyncOutcome::NeedsRetry(delay) => {
                        tracing::warn!(?delay, "Feeds unsettled, skipping tick");
                        sleep(delay).await;
                    }
                }
                self.state = LoopState::AwaitingWindow;
            } else {
                tracing::debug!("Outside action window");
                self.state = LoopState::AwaitingWindow;
            }

            sleep(self.config.poll_interval).await;
        }
    }

    /// Invoke the strategy on the current frames and submit its
    /// instructions in order. Each submission is isolated: one rejected
    /// order never aborts its siblings.
    async fn decide_and_submit(
        &mut self,
        strategy: &dyn Strategy,
        broker: &Arc<dyn Broker>,
        orders: &mut OrderLifecycleManager,
    ) {
        self.state = LoopState::Deciding;
        let data = self.coordinator.data();
        let instructions = match strategy.decide(&data) {
            Ok(instructions) => instructions,
            Err(e) => {
                tracing::error!(strategy = strategy.name(), error = %e, "Strategy failed");
                return;
            }
        };
        if instructions.is_empty() {
            return;
        }

        self.state = LoopState::Submitting;
        for instruction in &instructions {
            tracing::info!(
                instrument = %instruction.instrument,
                quantity = instruction.quantity,
                "New order instruction"
            );
            match orders.submit(instruction).await {
                Ok(order_id) => tracing::info!(%order_id, "Order submitted"),
                Err(e) => tracing::error!(error = %e, "Order submission failed"),
            }
        }

        match broker.get_cash().await {
            Ok(cash) => tracing::info!(cash, "Post-submit cash"),
            Err(e) => tracing::warn!(error = %e, "Cash query failed"),
        }
    }

    /// Flatten every tracked symbol and disconnect. Terminal.
    async fn liquidate(&mut self, broker: &Arc<dyn Broker>, orders: &mut OrderLifecycleManager) {
        self.state = LoopState::EndOfDayLiquidation;
        // Only feeds this loop trades on are flattened; holdings the account
        // carries outside the loop are not ours to touch.
        let symbols = self.coordinator.symbols();
        tracing::info!(?symbols, "End of day reached, liquidating positions");

        if let Err(e) = orders.close_position(&symbols).await {
            tracing::error!(error = %e, "Liquidation failed");
        }
        if let Err(e) = broker.stop().await {
            tracing::error!(error = %e, "Broker stop failed");
        }
        self.state = LoopState::Stopped;
    }
}

/// The per-tick slice, measured from the start of each wall-clock minute,
/// during which the loop may sync and submit.
fn in_action_window(now: DateTime<Utc>, window_secs: u32) -> bool {
    let second = now.second();
    0 < second && second <= window_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PaperBroker;
    use crate::grabber::SyntheticGrabber;
    use crate::models::{Bar, OrderInstruction};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Duration;

    fn fast_config() -> TraderConfig {
        TraderConfig {
            poll_interval: Duration::from_millis(1),
            retry_backoff: Duration::from_millis(1),
            stale_backoff: Duration::from_millis(1),
            cancel_delay: Duration::from_millis(1),
            ..TraderConfig::default()
        }
    }

    /// Emits canned instructions once, then requests a stop.
    struct OneShotStrategy {
        instructions: Vec<OrderInstruction>,
        stop: StopHandle,
        calls: Arc<AtomicUsize>,
    }

    impl Strategy for OneShotStrategy {
        fn decide(
            &self,
            _feeds: &HashMap<String, Vec<Bar>>,
        ) -> crate::Result<Vec<OrderInstruction>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stop.stop();
            Ok(self.instructions.clone())
        }

        fn name(&self) -> &str {
            "OneShotStrategy"
        }
    }

    fn trader_with_paper_broker(
        broker: Arc<PaperBroker>,
        instructions: Vec<OrderInstruction>,
    ) -> (Trader, Arc<AtomicUsize>) {
        let mut trader = Trader::new(fast_config());
        trader.set_broker(broker);
        trader.add_feed(
            Feed::new("SOXL", "1m", "30m").unwrap().with_name("quote"),
            Arc::new(SyntheticGrabber::new(1)),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        trader.set_strategy(Box::new(OneShotStrategy {
            instructions,
            stop: trader.stop_handle(),
            calls: calls.clone(),
        }));
        (trader, calls)
    }

    #[test]
    fn test_action_window_boundaries() {
        let at = |s: u32| Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, s).unwrap();
        assert!(!in_action_window(at(0), 10));
        assert!(in_action_window(at(1), 10));
        assert!(in_action_window(at(10), 10));
        assert!(!in_action_window(at(11), 10));
        assert!(!in_action_window(at(45), 10));
    }

    #[tokio::test]
    async fn test_setup_fails_fast_without_broker() {
        let mut trader = Trader::new(fast_config());
        trader.set_strategy(Box::new(OneShotStrategy {
            instructions: Vec::new(),
            stop: trader.stop_handle(),
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        trader.add_feed(
            Feed::new("SOXL", "1m", "30m").unwrap(),
            Arc::new(SyntheticGrabber::new(1)),
        );

        assert!(matches!(
            trader.start().await.unwrap_err(),
            TradingError::Setup(_)
        ));
    }

    #[tokio::test]
    async fn test_setup_fails_fast_without_strategy_or_feeds() {
        let broker = Arc::new(PaperBroker::new(10_000.0));

        let mut trader = Trader::new(fast_config());
        trader.set_broker(broker.clone());
        trader.add_feed(
            Feed::new("SOXL", "1m", "30m").unwrap(),
            Arc::new(SyntheticGrabber::new(1)),
        );
        assert!(matches!(
            trader.start().await.unwrap_err(),
            TradingError::Setup(_)
        ));

        let mut trader = Trader::new(fast_config());
        trader.set_broker(broker);
        trader.set_strategy(Box::new(OneShotStrategy {
            instructions: Vec::new(),
            stop: trader.stop_handle(),
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        assert!(matches!(
            trader.start().await.unwrap_err(),
            TradingError::Setup(_)
        ));
    }

    #[tokio::test]
    async fn test_end_of_day_liquidates_and_stops() {
        let broker = Arc::new(PaperBroker::new(10_000.0));
        broker.set_mark_price("SOXL", 25.0);
        // SOXL is the tracked feed; TSLA is an account holding the loop
        // never traded and must be left alone.
        broker.set_position("SOXL", "USD", 10.0, 20.0);
        broker.set_position("TSLA", "USD", 7.0, 200.0);
        // Pin the clock to the liquidation minute.
        broker.set_now(Utc.with_ymd_and_hms(2024, 6, 3, 20, 59, 5).unwrap());

        let (mut trader, strategy_calls) =
            trader_with_paper_broker(broker.clone(), Vec::new());
        trader.start().await.unwrap();

        assert_eq!(trader.state(), LoopState::Stopped);
        assert_eq!(strategy_calls.load(Ordering::SeqCst), 0);
        let positions = broker
            .get_positions(&["SOXL".to_string(), "TSLA".to_string()])
            .await
            .unwrap();
        assert_eq!(positions["SOXL"].quantity, 0.0);
        assert_eq!(positions["TSLA"].quantity, 7.0);
    }

    #[tokio::test]
    async fn test_outside_window_skips_strategy() {
        let broker = Arc::new(PaperBroker::new(10_000.0));
        // Second 45 is outside the 10s action window.
        broker.set_now(Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 45).unwrap());

        let (mut trader, strategy_calls) =
            trader_with_paper_broker(broker.clone(), Vec::new());
        let stop = trader.stop_handle();
        let handle = tokio::spawn(async move {
            trader.start().await.unwrap();
            trader
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.stop();
        let trader = handle.await.unwrap();

        assert_eq!(trader.state(), LoopState::Stopped);
        assert_eq!(strategy_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stale_feed_aborts_tick_without_strategy() {
        use crate::feed::freshness::tests::{bar_at, FixedGrabber};
        use chrono::Duration as ChronoDuration;

        let broker = Arc::new(PaperBroker::new(10_000.0));
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 5).unwrap();
        broker.set_now(now);

        let mut trader = Trader::new(fast_config());
        trader.set_broker(broker);
        // Latest row is five intervals old: stale on every classification.
        trader.add_feed(
            Feed::new("SOXL", "1m", "30m").unwrap().with_name("quote"),
            Arc::new(FixedGrabber::new(vec![bar_at(
                now - ChronoDuration::seconds(300),
            )])),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        trader.set_strategy(Box::new(OneShotStrategy {
            instructions: Vec::new(),
            stop: trader.stop_handle(),
            calls: calls.clone(),
        }));

        let stop = trader.stop_handle();
        let handle = tokio::spawn(async move {
            trader.start().await.unwrap();
            trader
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.stop();
        let trader = handle.await.unwrap();

        assert_eq!(trader.state(), LoopState::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failed_submission() {
        let broker = Arc::new(PaperBroker::new(10_000.0));
        broker.set_mark_price("SOXL", 25.0);
        broker.set_now(Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 5).unwrap());

        // First instruction is invalid (zero quantity); second must still go
        // through.
        let bad = OrderInstruction::market("SOXL-USD-SPOT".parse().unwrap(), 0.0);
        let good = OrderInstruction::market("SOXL-USD-SPOT".parse().unwrap(), 50.0);
        let (mut trader, strategy_calls) =
            trader_with_paper_broker(broker.clone(), vec![bad, good]);
        trader.start().await.unwrap();

        assert_eq!(strategy_calls.load(Ordering::SeqCst), 1);
        let positions = broker.get_positions(&["SOXL".to_string()]).await.unwrap();
        assert_eq!(positions["SOXL"].quantity, 50.0);
    }
}
