//! End-to-end dry run: simulator feed, warmup scorer, position engine

use autotrader::core::events::{TradeEventKind, TradeLogEntry};
use autotrader::engine::{EngineConfig, MemoryTradeLog, PositionEngine};
use autotrader::market::{PriceSimulator, SimBroker, SimulatorFeed};
use autotrader::signal::WeightedConfidenceProvider;
use autotrader::types::Symbol;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn run_dry_session(seed: u64, virtual_secs: u64) -> Vec<TradeLogEntry> {
    let symbol = Symbol::new("SIMUSD");
    let simulator = Arc::new(Mutex::new(PriceSimulator::new(100.0, 0.01, seed)));
    let client = Arc::new(SimBroker::new(
        Arc::clone(&simulator),
        vec![symbol.clone()],
    ));
    let feed = Arc::new(SimulatorFeed::new(simulator));
    let provider =
        Arc::new(WeightedConfidenceProvider::new(0.6, HashSet::new()).with_warmup_momentum());
    let logger = Arc::new(MemoryTradeLog::new());

    let config = EngineConfig {
        poll_interval: Duration::from_secs(1),
        ..Default::default()
    };
    let engine =
        PositionEngine::new(client, feed, provider, Arc::clone(&logger) as _, config).unwrap();
    engine.start_symbol(symbol.clone()).unwrap();
    tokio::time::sleep(Duration::from_secs(virtual_secs)).await;
    engine.stop_symbol(&symbol).await;

    logger.entries()
}

fn replayable(entries: &[TradeLogEntry]) -> Vec<(TradeEventKind, Option<String>)> {
    entries
        .iter()
        .map(|entry| (entry.kind, entry.price.map(|price| price.to_string())))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn same_seed_replays_the_same_trades() {
    let first = run_dry_session(42, 120).await;
    let second = run_dry_session(42, 120).await;
    assert_eq!(replayable(&first), replayable(&second));
}

#[tokio::test(start_paused = true)]
async fn log_is_bracketed_by_start_and_stop() {
    let entries = run_dry_session(7, 30).await;
    assert!(entries.len() >= 2);
    assert_eq!(entries.first().unwrap().kind, TradeEventKind::Start);
    assert_eq!(entries.last().unwrap().kind, TradeEventKind::Stop);

    // Every exit-side record carries a price and a size
    for entry in &entries {
        match entry.kind {
            TradeEventKind::Entry | TradeEventKind::Exit | TradeEventKind::PartialExit => {
                assert!(entry.price.is_some());
                assert!(entry.size.is_some());
            }
            TradeEventKind::Start | TradeEventKind::Stop => {
                assert!(entry.price.is_none());
            }
        }
    }
}
