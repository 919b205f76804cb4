use std::sync::Arc;

use clap::Parser;

use intradaybot::broker::PaperBroker;
use intradaybot::config::TraderConfig;
use intradaybot::feed::Feed;
use intradaybot::grabber::SyntheticGrabber;
use intradaybot::models::Instrument;
use intradaybot::strategy::SmaCrossStrategy;
use intradaybot::trader::Trader;

#[derive(Parser, Debug)]
#[command(name = "intradaybot", about = "Intraday trading loop (paper account)")]
struct Args {
    /// Instrument to trade, as SYMBOL-CURRENCY-TRADETYPE.
    #[arg(long, default_value = "SOXL-USD-SPOT")]
    instrument: String,

    /// Bar interval for the quote feed (e.g. 1m, 5m, 1h).
    #[arg(long, default_value = "1m")]
    interval: String,

    /// Lookback period fetched on every refresh.
    #[arg(long, default_value = "3h")]
    period: String,

    /// Shares per signal.
    #[arg(long, default_value_t = 50.0)]
    quantity: f64,

    /// Starting paper-account cash.
    #[arg(long, default_value_t = 100_000.0)]
    cash: f64,

    /// Seed for the synthetic data generator.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let instrument: Instrument = args.instrument.parse()?;
    let config = TraderConfig::from_env();

    tracing::info!(
        instrument = %instrument,
        interval = %args.interval,
        cash = args.cash,
        "Intraday bot starting"
    );

    let broker = Arc::new(PaperBroker::new(args.cash));
    broker.set_mark_price(&instrument.symbol, 150.0);

    let mut trader = Trader::new(config);
    trader.set_broker(broker);
    trader.add_feed(
        Feed::new(&instrument.symbol, &args.interval, &args.period)?.with_name("quote"),
        Arc::new(SyntheticGrabber::new(args.seed)),
    );
    trader.set_strategy(Box::new(SmaCrossStrategy::new(
        "quote",
        instrument,
        args.quantity,
    )));

    let stop = trader.stop_handle();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
            stop.stop();
        }
        result = trader.start() => {
            result?;
        }
    }

    tracing::info!("Intraday bot stopped");
    Ok(())
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "intradaybot=info".to_string()),
        )
        .init();
}
