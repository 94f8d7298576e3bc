//! Verification chains: who vouched for whom, up to a trust root.

use arban_store::{StoreError, TrustRead};
use arban_types::{CitizenId, EdgeId, Timestamp, VerificationMethod};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One hop of a chain: `verifier` vouched for `verified` through `edge`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub edge: EdgeId,
    pub verifier: CitizenId,
    pub verified: CitizenId,
    pub method: VerificationMethod,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChain {
    pub citizen: CitizenId,
    /// Hops from `citizen` upward, nearest first.
    pub links: Vec<ChainLink>,
    /// The walk ended at a supreme-role citizen.
    pub reaches_root: bool,
    /// The walk stopped at the depth ceiling.
    pub truncated: bool,
}

impl VerificationChain {
    /// Distance from the nearest trust root, in hops.
    pub fn depth(&self) -> usize {
        self.links.len()
    }

    /// Verifiers from nearest to furthest.
    pub fn verifiers(&self) -> impl Iterator<Item = &CitizenId> {
        self.links.iter().map(|l| &l.verifier)
    }
}

/// Walk active inbound edges upward from `citizen`.
///
/// When a citizen has several active inbound edges, the earliest one is
/// followed. The walk stops at a trust root, at a citizen with no active
/// inbound edge, at a cycle, or after `limit` hops.
pub fn walk_chain<T: TrustRead + ?Sized>(
    txn: &T,
    citizen: &CitizenId,
    limit: u32,
) -> Result<VerificationChain, StoreError> {
    let mut chain = VerificationChain {
        citizen: citizen.clone(),
        links: Vec::new(),
        reaches_root: false,
        truncated: false,
    };
    let mut visited = HashSet::from([citizen.clone()]);
    let mut current = citizen.clone();

    loop {
        if txn
            .citizen(&current)?
            .is_some_and(|c| c.role.is_trust_root())
        {
            chain.reaches_root = true;
            break;
        }
        if chain.links.len() >= limit as usize {
            chain.truncated = true;
            break;
        }
        let Some(edge) = txn
            .active_edges_to(&current)?
            .into_iter()
            .min_by_key(|e| (e.created_at, e.id))
        else {
            break;
        };
        if !visited.insert(edge.verifier.clone()) {
            break;
        }
        current = edge.verifier.clone();
        chain.links.push(ChainLink {
            edge: edge.id,
            verifier: edge.verifier,
            verified: edge.verified,
            method: edge.method,
            created_at: edge.created_at,
        });
    }

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_nullables::NullTrustStore;
    use arban_store::{Citizen, TrustStore, TrustWrite, VerificationEdge};
    use arban_types::Role;
    use std::collections::BTreeMap;

    fn seed(store: &NullTrustStore, citizens: &[(&str, Role)], edges: &[(&str, &str)]) {
        let mut txn = store.write_txn().unwrap();
        for (id, role) in citizens {
            txn.put_citizen(&Citizen::new((*id).into(), *role, 5, Timestamp::new(1)))
                .unwrap();
        }
        for (i, (from, to)) in edges.iter().enumerate() {
            let id = txn.next_edge_id().unwrap();
            let edge = VerificationEdge::new(
                id,
                (*from).into(),
                (*to).into(),
                VerificationMethod::PeerReferral,
                BTreeMap::new(),
                Timestamp::new(10 + i as u64),
            );
            txn.insert_edge(&edge).unwrap();
        }
        txn.commit().unwrap();
    }

    #[test]
    fn chain_ends_at_root() {
        let store = NullTrustStore::new();
        seed(
            &store,
            &[
                ("root", Role::Supreme),
                ("a", Role::Ordinary),
                ("b", Role::Ordinary),
            ],
            &[("root", "a"), ("a", "b")],
        );
        let txn = store.read_txn().unwrap();
        let chain = walk_chain(&*txn, &"b".into(), 10).unwrap();
        assert!(chain.reaches_root);
        assert_eq!(chain.depth(), 2);
        let names: Vec<_> = chain.verifiers().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["a", "root"]);
    }

    #[test]
    fn root_has_empty_chain() {
        let store = NullTrustStore::new();
        seed(&store, &[("root", Role::Supreme)], &[]);
        let txn = store.read_txn().unwrap();
        let chain = walk_chain(&*txn, &"root".into(), 10).unwrap();
        assert!(chain.reaches_root);
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn cycle_terminates() {
        let store = NullTrustStore::new();
        seed(
            &store,
            &[("a", Role::Ordinary), ("b", Role::Ordinary)],
            &[("a", "b"), ("b", "a")],
        );
        let txn = store.read_txn().unwrap();
        let chain = walk_chain(&*txn, &"a".into(), 10).unwrap();
        assert!(!chain.reaches_root);
        assert_eq!(chain.depth(), 1);
    }

    #[test]
    fn long_chain_is_truncated() {
        let store = NullTrustStore::new();
        let names: Vec<String> = (0..15).map(|i| format!("c{i}")).collect();
        let citizens: Vec<(&str, Role)> = names.iter().map(|n| (n.as_str(), Role::Ordinary)).collect();
        let edges: Vec<(&str, &str)> = names
            .windows(2)
            .map(|w| (w[0].as_str(), w[1].as_str()))
            .collect();
        seed(&store, &citizens, &edges);
        let txn = store.read_txn().unwrap();
        let chain = walk_chain(&*txn, &"c14".into(), 10).unwrap();
        assert!(chain.truncated);
        assert_eq!(chain.depth(), 10);
    }
}
