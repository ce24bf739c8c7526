pub mod feed;
pub mod sim_client;
pub mod simulator;

pub use feed::{BrokerFeed, FeedError, PriceFeed, SimulatorFeed};
pub use sim_client::{SimBroker, SimError};
pub use simulator::PriceSimulator;
