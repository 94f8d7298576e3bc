//! Fire-and-forget boundary around the distribution sink.
//!
//! Nothing returned from here is an error: failures are logged at `warn` and
//! reported as `None`/`false` so callers can count them, never propagate them.

use crate::sink::{DistributionReceipt, DistributionSink};
use arban_types::{CitizenId, TrustLevel};
use std::sync::Arc;

#[derive(Clone)]
pub struct FireAndForget {
    sink: Arc<dyn DistributionSink>,
}

impl FireAndForget {
    pub fn new(sink: Arc<dyn DistributionSink>) -> Self {
        Self { sink }
    }

    /// Register a citizen with the ledger. Returns whether the call succeeded.
    pub fn register(&self, citizen: &CitizenId) -> bool {
        match self.sink.register_citizen(citizen) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%citizen, error = %e, "distribution registration failed");
                false
            }
        }
    }

    /// Tell the ledger a citizen reached `level`.
    pub fn level_reached(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
    ) -> Option<DistributionReceipt> {
        match self.sink.distribute_for_level(citizen, level) {
            Ok(receipt) => {
                if receipt.distributed {
                    tracing::info!(%citizen, %level, amount = %receipt.amount, "distributed for level");
                } else {
                    tracing::debug!(%citizen, %level, "nothing to distribute for level");
                }
                Some(receipt)
            }
            Err(e) => {
                tracing::warn!(%citizen, %level, error = %e, "distribution failed");
                None
            }
        }
    }
}
