pub mod client;
pub mod position;
pub mod risk;
pub mod trade_log;
pub mod trader;

pub use client::{BrokerClient, BrokerPosition};
pub use position::Position;
pub use risk::{evaluate, RuleDecision};
pub use trade_log::{FileTradeLog, MemoryTradeLog, TradeLogger};
pub use trader::{EngineCommand, EngineConfig, EngineError, PositionEngine};
