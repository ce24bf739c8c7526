//! Automated speculative trading core
//!
//! Broker session management (OAuth2 authorization, request/response
//! correlation over a streaming transport, reconnection) and a position
//! lifecycle engine (indicator-based entry scoring, layered exit rules)
//! behind one pluggable broker seam. A seeded price simulator drives the
//! same engine for dry runs.

pub mod auth;
pub mod broker;
pub mod config;
pub mod core;
pub mod engine;
pub mod market;
pub mod session;
pub mod signal;
pub mod types;

pub use config::{AppConfig, ConfigError, Environment, RiskConfig, RiskLevel};
pub use engine::{BrokerClient, EngineConfig, Position, PositionEngine};
pub use market::{PriceFeed, PriceSimulator, SimBroker, SimulatorFeed};
pub use session::{SessionManager, SessionState};
pub use signal::{Signal, SignalProvider, WeightedConfidenceProvider};
pub use types::{Price, Size, Symbol};

/// Initialize logging with fern, mirroring console output into an optional
/// log file
pub fn init_logging(level: &str, log_file: Option<&str>) -> Result<(), fern::InitError> {
    let level = level.parse().unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
