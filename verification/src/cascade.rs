//! Cascade revocation.
//!
//! When a citizen loses their standing, every edge they granted is suspended.
//! A citizen whose last active inbound edge goes away loses their standing in
//! turn, and the cascade continues from them. Processing is an explicit
//! worklist, one level per step, bounded by the configured depth ceiling.

use arban_store::{StoreError, TrustWrite};
use arban_types::{CitizenId, EdgeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// What a cascade touched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// Edges suspended, in processing order.
    pub suspended: Vec<EdgeId>,
    /// Citizens who lost their standing because of the cascade.
    pub unverified: Vec<CitizenId>,
    /// Deepest level processed (the root's own grants are level 1).
    pub depth_reached: u32,
    /// Some unsupported grants were left active at the depth ceiling.
    pub truncated: bool,
}

impl CascadeReport {
    pub fn count(&self) -> usize {
        self.suspended.len()
    }
}

/// Suspend everything downstream of `root`, who must already have lost their
/// standing. Suspension is idempotent: inactive edges are skipped.
pub fn run_cascade<W: TrustWrite + ?Sized>(
    txn: &mut W,
    root: &CitizenId,
    cause: &str,
    suspended_by: Option<&CitizenId>,
    depth_limit: u32,
    now: Timestamp,
) -> Result<CascadeReport, StoreError> {
    let mut report = CascadeReport::default();
    let mut queue = VecDeque::from([(root.clone(), 1u32)]);
    let mut seen = HashSet::from([root.clone()]);

    while let Some((origin, depth)) = queue.pop_front() {
        let grants = txn.active_edges_from(&origin)?;
        if grants.is_empty() {
            continue;
        }
        if depth > depth_limit {
            report.truncated = true;
            tracing::warn!(
                origin = %origin,
                depth,
                left_active = grants.len(),
                "cascade depth ceiling reached"
            );
            continue;
        }
        report.depth_reached = report.depth_reached.max(depth);

        let reason = format!("cascade from {origin}: {cause}");
        let mut granted_removed = 0u32;
        for mut edge in grants {
            if !edge.suspend(reason.clone(), suspended_by.cloned(), now) {
                continue;
            }
            txn.update_edge(&edge)?;
            report.suspended.push(edge.id);
            granted_removed += 1;
            tracing::debug!(edge = %edge.id, verified = %edge.verified, depth, "suspended edge");

            let Some(mut target) = txn.citizen(&edge.verified)? else {
                continue;
            };
            if !target.is_verified || target.role.is_trust_root() {
                continue;
            }
            if !txn.active_edges_to(&target.id)?.is_empty() {
                continue;
            }
            target.is_verified = false;
            target.verified_at = None;
            txn.put_citizen(&target)?;
            report.unverified.push(target.id.clone());
            if seen.insert(target.id.clone()) {
                queue.push_back((target.id, depth + 1));
            }
        }

        if granted_removed > 0 {
            if let Some(mut verifier) = txn.citizen(&origin)? {
                verifier.verifications_given =
                    verifier.verifications_given.saturating_sub(granted_removed);
                txn.put_citizen(&verifier)?;
            }
        }
    }

    tracing::info!(
        root = %root,
        suspended = report.count(),
        unverified = report.unverified.len(),
        truncated = report.truncated,
        "cascade finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_nullables::NullTrustStore;
    use arban_store::{Citizen, TrustRead, TrustStore, VerificationEdge};
    use arban_types::{Role, VerificationMethod};
    use std::collections::BTreeMap;

    fn citizen<W: TrustWrite + ?Sized>(txn: &mut W, id: &str, role: Role, verified: bool) {
        let mut c = Citizen::new(id.into(), role, 5, Timestamp::new(1));
        c.is_verified = verified;
        txn.put_citizen(&c).unwrap();
    }

    fn grant<W: TrustWrite + ?Sized>(txn: &mut W, from: &str, to: &str) -> EdgeId {
        let id = txn.next_edge_id().unwrap();
        txn.insert_edge(&VerificationEdge::new(
            id,
            from.into(),
            to.into(),
            VerificationMethod::PeerReferral,
            BTreeMap::new(),
            Timestamp::new(5),
        ))
        .unwrap();
        let mut v = txn.citizen(&from.into()).unwrap().unwrap();
        v.verifications_given += 1;
        txn.put_citizen(&v).unwrap();
        id
    }

    #[test]
    fn chain_is_suspended_transitively() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        citizen(&mut *txn, "a", Role::Ordinary, false);
        for id in ["b", "c", "d"] {
            citizen(&mut *txn, id, Role::Ordinary, true);
        }
        grant(&mut *txn, "a", "b");
        grant(&mut *txn, "b", "c");
        grant(&mut *txn, "c", "d");

        let report = run_cascade(&mut *txn, &"a".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(report.count(), 3);
        assert_eq!(report.depth_reached, 3);
        assert!(!report.truncated);
        for id in ["b", "c", "d"] {
            assert!(!txn.citizen(&id.into()).unwrap().unwrap().is_verified);
        }
        assert_eq!(txn.citizen(&"b".into()).unwrap().unwrap().verifications_given, 0);
        let edge = txn.edge_between(&"a".into(), &"b".into()).unwrap().unwrap();
        assert!(!edge.is_active);
        assert_eq!(edge.suspended_reason.as_deref(), Some("cascade from a: fraud"));
    }

    #[test]
    fn alternate_path_keeps_standing() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        citizen(&mut *txn, "a", Role::Ordinary, false);
        citizen(&mut *txn, "x", Role::Ordinary, true);
        citizen(&mut *txn, "b", Role::Ordinary, true);
        citizen(&mut *txn, "c", Role::Ordinary, true);
        grant(&mut *txn, "a", "b");
        grant(&mut *txn, "x", "b");
        grant(&mut *txn, "b", "c");

        let report = run_cascade(&mut *txn, &"a".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(report.count(), 1);
        assert!(report.unverified.is_empty());
        assert!(txn.citizen(&"c".into()).unwrap().unwrap().is_verified);
    }

    #[test]
    fn depth_ceiling_bounds_long_chains() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        let names: Vec<String> = (0..15).map(|i| format!("c{i}")).collect();
        for (i, name) in names.iter().enumerate() {
            citizen(&mut *txn, name, Role::Ordinary, i > 0);
        }
        for pair in names.windows(2) {
            grant(&mut *txn, &pair[0], &pair[1]);
        }

        let report = run_cascade(&mut *txn, &"c0".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(report.count(), 10);
        assert_eq!(report.depth_reached, 10);
        assert!(report.truncated);
        assert!(txn
            .edge_between(&"c11".into(), &"c12".into())
            .unwrap()
            .unwrap()
            .is_active);
    }

    #[test]
    fn cycle_terminates() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        for id in ["a", "b", "c"] {
            citizen(&mut *txn, id, Role::Ordinary, true);
        }
        grant(&mut *txn, "a", "b");
        grant(&mut *txn, "b", "c");
        grant(&mut *txn, "c", "a");

        let report = run_cascade(&mut *txn, &"a".into(), "loop", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(report.count(), 3);
        assert!(!report.truncated);
    }

    #[test]
    fn trust_roots_keep_standing() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        citizen(&mut *txn, "a", Role::Ordinary, false);
        citizen(&mut *txn, "root", Role::Supreme, true);
        citizen(&mut *txn, "b", Role::Ordinary, true);
        grant(&mut *txn, "a", "root");
        grant(&mut *txn, "root", "b");

        let report = run_cascade(&mut *txn, &"a".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(report.count(), 1);
        assert!(txn.citizen(&"root".into()).unwrap().unwrap().is_verified);
        assert!(txn.citizen(&"b".into()).unwrap().unwrap().is_verified);
    }

    #[test]
    fn rerun_is_a_no_op() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        citizen(&mut *txn, "a", Role::Ordinary, false);
        citizen(&mut *txn, "b", Role::Ordinary, true);
        grant(&mut *txn, "a", "b");
        run_cascade(&mut *txn, &"a".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        let again = run_cascade(&mut *txn, &"a".into(), "fraud", None, 10, Timestamp::new(9)).unwrap();
        assert_eq!(again.count(), 0);
    }
}
