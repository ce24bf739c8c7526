//! Simulator-driven dry run
//!
//! Wires the seeded price simulator, the weighted-confidence scorer and the
//! position engine together without touching a real broker. Knobs come from
//! `SIM_*` environment variables; trades land in `sim_trades.jsonl`.

use autotrader::engine::{EngineConfig, FileTradeLog, PositionEngine};
use autotrader::market::{PriceSimulator, SimBroker, SimulatorFeed};
use autotrader::signal::WeightedConfidenceProvider;
use autotrader::types::Symbol;
use log::info;
use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("sim_run failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    autotrader::init_logging("info", None)?;

    let seed: u64 = env_or("SIM_SEED", 42);
    let base_price: f64 = env_or("SIM_BASE_PRICE", 100.0);
    let volatility: f64 = env_or("SIM_VOLATILITY", 0.01);
    let duration = Duration::from_secs(env_or("SIM_DURATION_SECS", 60));

    info!(
        "Starting dry run: seed {}, base price {}, volatility {}",
        seed, base_price, volatility
    );

    let symbol = Symbol::new("SIMUSD");
    let simulator = Arc::new(Mutex::new(PriceSimulator::new(base_price, volatility, seed)));
    let client = Arc::new(SimBroker::new(
        Arc::clone(&simulator),
        vec![symbol.clone()],
    ));
    let feed = Arc::new(SimulatorFeed::new(simulator));
    let provider =
        Arc::new(WeightedConfidenceProvider::new(0.6, HashSet::new()).with_warmup_momentum());
    let logger = Arc::new(FileTradeLog::open("sim_trades.jsonl")?);

    let config = EngineConfig {
        poll_interval: Duration::from_millis(250),
        ..Default::default()
    };
    let engine = PositionEngine::new(Arc::clone(&client), feed, provider, logger, config)?;
    engine.start_symbol(symbol.clone())?;

    tokio::select! {
        _ = tokio::time::sleep(duration) => info!("Dry run duration elapsed"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    engine.stop_all().await;

    use autotrader::engine::BrokerClient;
    let open = client.get_positions().await?;
    if open.is_empty() {
        info!("Dry run complete, no open positions");
    } else {
        for position in open {
            info!(
                "Dry run complete, still holding {} {} from {}",
                position.size, position.symbol, position.entry_price
            );
        }
    }
    info!("Trade log written to sim_trades.jsonl");
    Ok(())
}
