//! Benchmark helpers for immoprix.
//!
//! - Synthetic DVF-like transactions with a known price structure
//! - Stage timing and latency statistics

pub mod data;
pub mod utils;

pub use data::SyntheticMarket;
pub use utils::{time_fn, LatencyStats, Timer};
