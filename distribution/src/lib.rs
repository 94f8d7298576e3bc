//! Distribution collaborator: the currency side of level transitions.
//!
//! The trust engines never depend on distribution succeeding. Every call goes
//! through [`FireAndForget`], which logs and discards failures so a level change
//! stays valid while the pool is unavailable. Reconciling missed distributions
//! is the distribution service's own business.

pub mod boundary;
pub mod client;
pub mod error;
pub mod sink;

pub use boundary::FireAndForget;
pub use client::{DispatchingDistribution, HttpDistributionClient};
pub use error::DistributionError;
pub use sink::{DistributionReceipt, DistributionSink, NoDistribution};
