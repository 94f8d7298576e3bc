//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies (clock, storage, distribution ledger) are abstracted
//! behind traits. This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (advance time, inject failures)
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod distribution;
pub mod store;

pub use clock::NullClock;
pub use distribution::{DistributionCall, NullDistribution};
pub use store::NullTrustStore;
