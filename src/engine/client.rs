use crate::core::events::{OrderIntent, OrderSide, PriceBar};
use crate::types::{Price, Size, Symbol};
use async_trait::async_trait;

/// Broker-side view of an open position, used for reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub size: Size,
    pub entry_price: Price,
}

/// Uniform order/data surface the trading engine runs against
///
/// The live session and the simulator both implement this, so the engine
/// never cares where fills and bars come from.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn connect(&self) -> Result<(), Self::Error>;

    async fn disconnect(&self) -> Result<(), Self::Error>;

    /// Most recent bars for the symbol, oldest first
    async fn get_bars(&self, symbol: &Symbol, count: u32) -> Result<Vec<PriceBar>, Self::Error>;

    async fn submit_order(&self, intent: &OrderIntent) -> Result<(), Self::Error>;

    async fn get_positions(&self) -> Result<Vec<BrokerPosition>, Self::Error>;

    async fn get_tradable_symbols(&self) -> Result<Vec<Symbol>, Self::Error>;

    /// Smallest price increment for the symbol
    fn min_tick(&self, symbol: &Symbol) -> Price;

    fn is_connected(&self) -> bool;
}
