pub mod manager;

pub use manager::{
    SessionError, SessionManager, SessionSnapshot, SessionState, TransportFactory,
};
