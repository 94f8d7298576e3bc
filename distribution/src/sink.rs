//! The narrow interface the trust engines need from the distribution ledger.

use crate::error::DistributionError;
use arban_types::{CitizenId, TrustLevel};
use serde::{Deserialize, Serialize};

/// Result of asking the ledger to distribute for a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReceipt {
    /// Whether currency actually moved (false when the level was already paid out).
    pub distributed: bool,
    pub amount: u128,
}

impl DistributionReceipt {
    pub fn nothing() -> Self {
        Self {
            distributed: false,
            amount: 0,
        }
    }
}

/// A distribution ledger.
///
/// Implementations must be idempotent: registering twice, or distributing twice
/// for the same level, must not pay out twice.
pub trait DistributionSink: Send + Sync {
    fn register_citizen(&self, citizen: &CitizenId) -> Result<(), DistributionError>;

    fn distribute_for_level(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
    ) -> Result<DistributionReceipt, DistributionError>;
}

/// A sink for deployments without a distribution ledger.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDistribution;

impl DistributionSink for NoDistribution {
    fn register_citizen(&self, _citizen: &CitizenId) -> Result<(), DistributionError> {
        Ok(())
    }

    fn distribute_for_level(
        &self,
        _citizen: &CitizenId,
        _level: TrustLevel,
    ) -> Result<DistributionReceipt, DistributionError> {
        Ok(DistributionReceipt::nothing())
    }
}
