//! Nullable distribution ledger: records every call, can be told to fail.

use arban_distribution::{DistributionError, DistributionReceipt, DistributionSink};
use arban_types::{CitizenId, TrustLevel};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DistributionCall {
    Register(CitizenId),
    Distribute(CitizenId, TrustLevel),
}

/// Pays a fixed amount per `(citizen, level)` once, like an idempotent ledger.
pub struct NullDistribution {
    calls: Mutex<Vec<DistributionCall>>,
    paid: Mutex<HashSet<(CitizenId, TrustLevel)>>,
    failing: AtomicBool,
    amount_per_level: u128,
}

impl NullDistribution {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            paid: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
            amount_per_level: 100,
        }
    }

    /// Make every subsequent call fail as if the pool were uninitialized.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<DistributionCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Levels distributed for `citizen`, in call order.
    pub fn distributions_for(&self, citizen: &CitizenId) -> Vec<TrustLevel> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DistributionCall::Distribute(id, level) if &id == citizen => Some(level),
                _ => None,
            })
            .collect()
    }
}

impl Default for NullDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionSink for NullDistribution {
    fn register_citizen(&self, citizen: &CitizenId) -> Result<(), DistributionError> {
        self.calls
            .lock()
            .unwrap()
            .push(DistributionCall::Register(citizen.clone()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(DistributionError::PoolNotInitialized);
        }
        Ok(())
    }

    fn distribute_for_level(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
    ) -> Result<DistributionReceipt, DistributionError> {
        self.calls
            .lock()
            .unwrap()
            .push(DistributionCall::Distribute(citizen.clone(), level));
        if self.failing.load(Ordering::SeqCst) {
            return Err(DistributionError::PoolNotInitialized);
        }
        let first = self.paid.lock().unwrap().insert((citizen.clone(), level));
        Ok(if first {
            DistributionReceipt {
                distributed: true,
                amount: self.amount_per_level,
            }
        } else {
            DistributionReceipt::nothing()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pays_each_level_once() {
        let ledger = NullDistribution::new();
        let c = CitizenId::new("c1");
        let first = ledger.distribute_for_level(&c, TrustLevel::GroupVerified).unwrap();
        let second = ledger.distribute_for_level(&c, TrustLevel::GroupVerified).unwrap();
        assert!(first.distributed);
        assert!(!second.distributed);
        assert_eq!(ledger.distributions_for(&c).len(), 2);
    }

    #[test]
    fn failing_ledger_still_records_calls() {
        let ledger = NullDistribution::new();
        ledger.set_failing(true);
        let c = CitizenId::new("c1");
        assert!(ledger.register_citizen(&c).is_err());
        assert_eq!(ledger.calls(), vec![DistributionCall::Register(c)]);
    }
}
