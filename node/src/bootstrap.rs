//! Startup reconciliation of trust roots.
//!
//! Supreme-role citizens anchor every verification chain. Whatever state they
//! were left in, at startup they are put back at `FULLY_VERIFIED` and marked
//! verified. Running it again changes nothing.

use crate::error::ServiceError;
use crate::service::TrustService;
use arban_levels::LevelTransition;
use arban_store::TrustStore;
use arban_types::{CitizenId, Role};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    /// Every supreme-role citizen in the store.
    pub trust_roots: Vec<CitizenId>,
    /// Level changes made to bring them to `FULLY_VERIFIED`.
    pub transitions: Vec<LevelTransition>,
}

impl BootstrapReport {
    pub fn changed_anything(&self) -> bool {
        !self.transitions.is_empty()
    }
}

impl<S: TrustStore> TrustService<S> {
    pub fn bootstrap(&self) -> Result<BootstrapReport, ServiceError> {
        let (report, _) = self.write(|txn, now| {
            let transitions = self.levels.reconcile_trust_roots(txn, now)?;
            let trust_roots = txn
                .citizens()?
                .into_iter()
                .filter(|c| c.role == Role::Supreme)
                .map(|c| c.id)
                .collect();
            Ok(BootstrapReport {
                trust_roots,
                transitions,
            })
        })?;
        for transition in &report.transitions {
            self.dispatch_transition(transition);
        }
        tracing::info!(
            trust_roots = report.trust_roots.len(),
            reconciled = report.transitions.len(),
            "bootstrap complete"
        );
        Ok(report)
    }
}
