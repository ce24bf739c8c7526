pub mod broker;
pub mod mock;
pub mod protocol;
pub mod transport;

pub use broker::{BrokerError, BrokerEvent, MessageBroker, REQUEST_TIMEOUT};
pub use mock::MockTransport;
pub use transport::{Transport, TransportError, WsTransport};
