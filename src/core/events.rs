use crate::types::{Price, Size, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTillCancelled,
    ImmediateOrCancel,
    FillOrKill,
}

/// One OHLCV sample for a fixed interval
/// Immutable once produced; consumers treat bar streams as append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: Timestamp,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Size,
}

impl PriceBar {
    pub fn new(
        timestamp: Timestamp,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: Size,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Ephemeral order request produced by the position engine
/// Not retained after submission acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Size,
    pub time_in_force: TimeInForce,
    pub client_order_id: Option<String>,
}

impl OrderIntent {
    /// Market buy for the full quantity
    pub fn market_buy(symbol: impl Into<Symbol>, quantity: Size) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            quantity,
            time_in_force: TimeInForce::GoodTillCancelled,
            client_order_id: None,
        }
    }

    /// Market sell for the given quantity
    pub fn market_sell(symbol: impl Into<Symbol>, quantity: Size) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            quantity,
            time_in_force: TimeInForce::GoodTillCancelled,
            client_order_id: None,
        }
    }

    /// Set the client order ID (builder pattern)
    pub fn with_client_order_id(mut self, client_order_id: String) -> Self {
        self.client_order_id = Some(client_order_id);
        self
    }
}

/// Why a position was (fully or partially) closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    TimeExit,
    PartialExit,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeExit => "time_exit",
            ExitReason::PartialExit => "partial_exit",
        }
    }
}

/// Kind of trade-log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeEventKind {
    Entry,
    Exit,
    PartialExit,
    Start,
    Stop,
}

/// Append-only trade-log record consumed by the trade log sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLogEntry {
    pub time: DateTime<Utc>,
    pub symbol: Symbol,
    pub kind: TradeEventKind,
    pub price: Option<Price>,
    pub size: Option<Size>,
    pub pl: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
    pub confidence: Option<f64>,
}

impl TradeLogEntry {
    /// A bare record carrying only the event kind (START/STOP markers)
    pub fn marker(symbol: impl Into<Symbol>, kind: TradeEventKind) -> Self {
        Self {
            time: Utc::now(),
            symbol: symbol.into(),
            kind,
            price: None,
            size: None,
            pl: None,
            exit_reason: None,
            confidence: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_intent_builders() {
        let buy = OrderIntent::market_buy("BTCUSD", Size::parse("0.5").unwrap());
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.time_in_force, TimeInForce::GoodTillCancelled);
        assert!(buy.client_order_id.is_none());

        let sell = OrderIntent::market_sell("BTCUSD", Size::parse("0.5").unwrap())
            .with_client_order_id("abc".to_string());
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.client_order_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_trade_log_entry_marker() {
        let entry = TradeLogEntry::marker("EURUSD", TradeEventKind::Start);
        assert_eq!(entry.kind, TradeEventKind::Start);
        assert!(entry.price.is_none());
        assert!(entry.pl.is_none());
    }

    #[test]
    fn test_exit_reason_strings() {
        assert_eq!(ExitReason::TrailingStop.as_str(), "trailing_stop");
        assert_eq!(ExitReason::PartialExit.as_str(), "partial_exit");
    }
}
