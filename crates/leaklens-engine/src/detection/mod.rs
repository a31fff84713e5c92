//! Mass-balance leak detection.

mod mass_balance;

pub use mass_balance::{DetectionRequest, MassBalanceDetector};
