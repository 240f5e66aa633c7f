pub mod error;
pub mod units;
pub mod pattern;
pub mod physics;
pub mod metrics;
pub mod cable;
pub mod io;
pub mod composer;

pub use error::{PatternError, Result};

#[cfg(test)]
mod tests;
