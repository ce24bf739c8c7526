pub mod indicators;
pub mod scoring;

pub use scoring::{Signal, SignalProvider, WeightedConfidenceProvider, MIN_BARS};

#[cfg(test)]
pub use scoring::MockSignalProvider;
