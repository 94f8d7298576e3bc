//! Nullable trust store: thread-safe in-memory storage for testing.
//!
//! Write transactions work on a private copy of the tables and swap it in on
//! commit, so a dropped transaction leaves the store exactly as it was.

use arban_store::{
    Citizen, GroupMutualVerification, StoreError, TrustRead, TrustStore, TrustWrite,
    VerificationEdge, VerificationRequest,
};
use arban_types::{CitizenId, EdgeId, GroupId, RequestId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};

#[derive(Clone, Default)]
struct Tables {
    citizens: BTreeMap<CitizenId, Citizen>,
    edges: BTreeMap<EdgeId, VerificationEdge>,
    edge_pairs: HashMap<(CitizenId, CitizenId), EdgeId>,
    requests: BTreeMap<RequestId, VerificationRequest>,
    group_verifications: BTreeMap<(GroupId, CitizenId, CitizenId), GroupMutualVerification>,
    next_edge_id: u64,
    next_request_id: u64,
}

/// An in-memory trust store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullTrustStore {
    tables: RwLock<Tables>,
    fail_commits: AtomicBool,
}

impl NullTrustStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make every subsequent commit fail, as if the backend went away mid-write.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Total number of edges ever created, active or not.
    pub fn edge_count(&self) -> usize {
        self.tables.read().unwrap().edges.len()
    }
}

impl Default for NullTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore for NullTrustStore {
    fn read_txn(&self) -> Result<Box<dyn TrustRead + '_>, StoreError> {
        let snapshot = self
            .tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?
            .clone();
        Ok(Box::new(snapshot))
    }

    fn write_txn(&self) -> Result<Box<dyn TrustWrite + '_>, StoreError> {
        let guard = self
            .tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        let working = guard.clone();
        Ok(Box::new(NullWriteTxn {
            guard,
            working,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

impl TrustRead for Tables {
    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, StoreError> {
        Ok(self.citizens.get(id).cloned())
    }

    fn citizens(&self) -> Result<Vec<Citizen>, StoreError> {
        Ok(self.citizens.values().cloned().collect())
    }

    fn group_members(&self, group: &GroupId) -> Result<Vec<Citizen>, StoreError> {
        Ok(self
            .citizens
            .values()
            .filter(|c| c.is_member_of(group))
            .cloned()
            .collect())
    }

    fn edge(&self, id: EdgeId) -> Result<Option<VerificationEdge>, StoreError> {
        Ok(self.edges.get(&id).cloned())
    }

    fn edge_between(
        &self,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<VerificationEdge>, StoreError> {
        Ok(self
            .edge_pairs
            .get(&(verifier.clone(), verified.clone()))
            .and_then(|id| self.edges.get(id))
            .cloned())
    }

    fn edges_from(&self, verifier: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        Ok(self
            .edges
            .values()
            .filter(|e| &e.verifier == verifier)
            .cloned()
            .collect())
    }

    fn edges_to(&self, verified: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        Ok(self
            .edges
            .values()
            .filter(|e| &e.verified == verified)
            .cloned()
            .collect())
    }

    fn request(&self, id: RequestId) -> Result<Option<VerificationRequest>, StoreError> {
        Ok(self.requests.get(&id).cloned())
    }

    fn requests(&self) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self.requests.values().cloned().collect())
    }

    fn group_verification(
        &self,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<GroupMutualVerification>, StoreError> {
        Ok(self
            .group_verifications
            .get(&(group.clone(), verifier.clone(), verified.clone()))
            .cloned())
    }

    fn group_verifications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<GroupMutualVerification>, StoreError> {
        Ok(self
            .group_verifications
            .values()
            .filter(|v| &v.group == group)
            .cloned()
            .collect())
    }
}

struct NullWriteTxn<'a> {
    guard: RwLockWriteGuard<'a, Tables>,
    working: Tables,
    fail_commit: bool,
}

impl TrustRead for NullWriteTxn<'_> {
    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, StoreError> {
        self.working.citizen(id)
    }

    fn citizens(&self) -> Result<Vec<Citizen>, StoreError> {
        self.working.citizens()
    }

    fn group_members(&self, group: &GroupId) -> Result<Vec<Citizen>, StoreError> {
        self.working.group_members(group)
    }

    fn edge(&self, id: EdgeId) -> Result<Option<VerificationEdge>, StoreError> {
        self.working.edge(id)
    }

    fn edge_between(
        &self,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<VerificationEdge>, StoreError> {
        self.working.edge_between(verifier, verified)
    }

    fn edges_from(&self, verifier: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        self.working.edges_from(verifier)
    }

    fn edges_to(&self, verified: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        self.working.edges_to(verified)
    }

    fn request(&self, id: RequestId) -> Result<Option<VerificationRequest>, StoreError> {
        self.working.request(id)
    }

    fn requests(&self) -> Result<Vec<VerificationRequest>, StoreError> {
        self.working.requests()
    }

    fn group_verification(
        &self,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<GroupMutualVerification>, StoreError> {
        self.working.group_verification(group, verifier, verified)
    }

    fn group_verifications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<GroupMutualVerification>, StoreError> {
        self.working.group_verifications(group)
    }
}

impl TrustWrite for NullWriteTxn<'_> {
    fn put_citizen(&mut self, citizen: &Citizen) -> Result<(), StoreError> {
        self.working
            .citizens
            .insert(citizen.id.clone(), citizen.clone());
        Ok(())
    }

    fn next_edge_id(&mut self) -> Result<EdgeId, StoreError> {
        self.working.next_edge_id += 1;
        Ok(EdgeId::new(self.working.next_edge_id))
    }

    fn insert_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError> {
        let pair = (edge.verifier.clone(), edge.verified.clone());
        if self.working.edge_pairs.contains_key(&pair) || self.working.edges.contains_key(&edge.id)
        {
            return Err(StoreError::Duplicate(format!(
                "edge {} -> {}",
                edge.verifier, edge.verified
            )));
        }
        self.working.edge_pairs.insert(pair, edge.id);
        self.working.edges.insert(edge.id, edge.clone());
        Ok(())
    }

    fn update_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError> {
        match self.working.edges.get_mut(&edge.id) {
            Some(existing)
                if existing.verifier == edge.verifier && existing.verified == edge.verified =>
            {
                *existing = edge.clone();
                Ok(())
            }
            Some(_) => Err(StoreError::Corruption(format!(
                "{} cannot change its endpoints",
                edge.id
            ))),
            None => Err(StoreError::NotFound(edge.id.to_string())),
        }
    }

    fn next_request_id(&mut self) -> Result<RequestId, StoreError> {
        self.working.next_request_id += 1;
        Ok(RequestId::new(self.working.next_request_id))
    }

    fn put_request(&mut self, request: &VerificationRequest) -> Result<(), StoreError> {
        self.working.requests.insert(request.id, request.clone());
        Ok(())
    }

    fn insert_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError> {
        let key = (
            verification.group.clone(),
            verification.verifier.clone(),
            verification.verified.clone(),
        );
        if self.working.group_verifications.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "group {} verification {} -> {}",
                verification.group, verification.verifier, verification.verified
            )));
        }
        self.working
            .group_verifications
            .insert(key, verification.clone());
        Ok(())
    }

    fn update_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError> {
        let key = (
            verification.group.clone(),
            verification.verifier.clone(),
            verification.verified.clone(),
        );
        match self.working.group_verifications.get_mut(&key) {
            Some(existing) => {
                *existing = verification.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "group {} verification {} -> {}",
                verification.group, verification.verifier, verification.verified
            ))),
        }
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Backend("injected commit failure".into()));
        }
        let NullWriteTxn {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_types::{Role, Timestamp, VerificationMethod};

    fn citizen(id: &str) -> Citizen {
        Citizen::new(id.into(), Role::Ordinary, 5, Timestamp::new(1))
    }

    fn edge(id: u64, from: &str, to: &str) -> VerificationEdge {
        VerificationEdge::new(
            EdgeId::new(id),
            from.into(),
            to.into(),
            VerificationMethod::PeerReferral,
            BTreeMap::new(),
            Timestamp::new(2),
        )
    }

    #[test]
    fn committed_writes_are_visible() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        txn.put_citizen(&citizen("a")).unwrap();
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        assert!(read.citizen(&"a".into()).unwrap().is_some());
    }

    #[test]
    fn dropped_txn_discards_writes() {
        let store = NullTrustStore::new();
        {
            let mut txn = store.write_txn().unwrap();
            txn.put_citizen(&citizen("a")).unwrap();
        }
        let read = store.read_txn().unwrap();
        assert!(read.citizen(&"a".into()).unwrap().is_none());
    }

    #[test]
    fn duplicate_pair_rejected() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        txn.insert_edge(&edge(1, "a", "b")).unwrap();
        let err = txn.insert_edge(&edge(2, "a", "b")).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        txn.insert_edge(&edge(3, "b", "a")).unwrap();
    }

    #[test]
    fn ids_are_monotonic_within_and_across_txns() {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        let a = txn.next_edge_id().unwrap();
        let b = txn.next_edge_id().unwrap();
        txn.commit().unwrap();
        let mut txn = store.write_txn().unwrap();
        let c = txn.next_edge_id().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn injected_commit_failure_keeps_old_state() {
        let store = NullTrustStore::new();
        store.set_fail_commits(true);
        let mut txn = store.write_txn().unwrap();
        txn.put_citizen(&citizen("a")).unwrap();
        assert!(txn.commit().is_err());
        store.set_fail_commits(false);
        assert!(store.read_txn().unwrap().citizens().unwrap().is_empty());
    }
}
