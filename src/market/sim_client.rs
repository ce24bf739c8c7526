use crate::core::events::{OrderIntent, OrderSide, PriceBar};
use crate::engine::client::{BrokerClient, BrokerPosition};
use crate::market::simulator::PriceSimulator;
use crate::types::{Price, Symbol};
use async_trait::async_trait;
use dashmap::DashMap;
use log::info;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Dry-run broker: orders fill instantly at the simulator's current price
///
/// No network, no credentials. Lets the full engine run against the
/// simulated walk through the same seam as the live session.
pub struct SimBroker {
    simulator: Arc<Mutex<PriceSimulator>>,
    symbols: Vec<Symbol>,
    positions: DashMap<String, BrokerPosition>,
}

impl SimBroker {
    pub fn new(simulator: Arc<Mutex<PriceSimulator>>, symbols: Vec<Symbol>) -> Self {
        Self {
            simulator,
            symbols,
            positions: DashMap::new(),
        }
    }

    fn fill_price(&self) -> Result<Price, SimError> {
        let simulator = self.simulator.lock().map_err(|_| SimError::Poisoned)?;
        Ok(simulator.current_price_decimal())
    }
}

#[async_trait]
impl BrokerClient for SimBroker {
    type Error = SimError;

    async fn connect(&self) -> Result<(), SimError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SimError> {
        Ok(())
    }

    async fn get_bars(&self, _symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, SimError> {
        let simulator = self.simulator.lock().map_err(|_| SimError::Poisoned)?;
        Ok(simulator.latest_bars(count as usize))
    }

    async fn submit_order(&self, intent: &OrderIntent) -> Result<(), SimError> {
        let price = self.fill_price()?;
        info!(
            "Simulated fill: {:?} {} {} @ {}",
            intent.side, intent.quantity, intent.symbol, price
        );
        let name = intent.symbol.as_str().to_string();
        match intent.side {
            OrderSide::Buy => {
                self.positions
                    .entry(name)
                    .and_modify(|position| position.size = position.size + intent.quantity)
                    .or_insert(BrokerPosition {
                        symbol: intent.symbol.clone(),
                        side: OrderSide::Buy,
                        size: intent.quantity,
                        entry_price: price,
                    });
            }
            OrderSide::Sell => {
                let remove = self
                    .positions
                    .get_mut(&name)
                    .map(|mut position| {
                        position.size = position.size - intent.quantity;
                        !position.size.is_positive()
                    })
                    .unwrap_or(false);
                if remove {
                    self.positions.remove(&name);
                }
            }
        }
        Ok(())
    }

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, SimError> {
        Ok(self
            .positions
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_tradable_symbols(&self) -> Result<Vec<Symbol>, SimError> {
        Ok(self.symbols.clone())
    }

    fn min_tick(&self, _symbol: &Symbol) -> Price {
        Price::new(Decimal::new(1, 2))
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Simulated broker error
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    Poisoned,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Poisoned => write!(f, "Simulator state poisoned"),
        }
    }
}

impl std::error::Error for SimError {}
