use crate::core::events::PriceBar;
use crate::engine::client::BrokerClient;
use crate::market::simulator::PriceSimulator;
use crate::types::Symbol;
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Source of recent bars for one symbol, oldest first
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn latest_bars(&self, symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, FeedError>;
}

/// Live feed backed by the broker client's bar queries
pub struct BrokerFeed<C: BrokerClient> {
    client: Arc<C>,
}

impl<C: BrokerClient> BrokerFeed<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C: BrokerClient> PriceFeed for BrokerFeed<C> {
    async fn latest_bars(&self, symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, FeedError> {
        self.client
            .get_bars(symbol, count)
            .await
            .map_err(|e| FeedError::Source(e.to_string()))
    }
}

/// Simulated feed: every poll advances the walk by one bar
pub struct SimulatorFeed {
    simulator: Arc<Mutex<PriceSimulator>>,
}

impl SimulatorFeed {
    pub fn new(simulator: Arc<Mutex<PriceSimulator>>) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl PriceFeed for SimulatorFeed {
    async fn latest_bars(&self, _symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, FeedError> {
        let mut simulator = self.simulator.lock().map_err(|_| FeedError::Poisoned)?;
        simulator.next_bar();
        Ok(simulator.latest_bars(count as usize))
    }
}

/// Price feed error
#[derive(Debug, Clone, PartialEq)]
pub enum FeedError {
    Source(String),
    Poisoned,
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Source(msg) => write!(f, "Feed source error: {}", msg),
            FeedError::Poisoned => write!(f, "Feed state poisoned"),
        }
    }
}

impl std::error::Error for FeedError {}
