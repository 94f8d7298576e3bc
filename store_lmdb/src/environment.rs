//! LMDB environment setup.

use std::path::Path;

use heed::{Env, EnvOpenOptions};

use arban_store::{StoreError, TrustRead, TrustStore, TrustWrite};

use crate::tables::{Databases, DATABASE_COUNT};
use crate::txn::{LmdbReadTxn, LmdbWriteTxn};
use crate::LmdbError;

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// The trust store backed by a single LMDB environment.
///
/// LMDB allows one writer at a time per environment, so write transactions
/// are serialized across the whole store.
pub struct LmdbTrustStore {
    env: Env,
    dbs: Databases,
}

impl LmdbTrustStore {
    /// Open or create a trust store at `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process per path, and the
        // files are not modified by anything other than LMDB while open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASE_COUNT)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let dbs = Databases::create(&env, &mut wtxn)?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB trust store");
        Ok(Self { env, dbs })
    }

    /// Flush the environment to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}

impl TrustStore for LmdbTrustStore {
    fn read_txn(&self) -> Result<Box<dyn TrustRead + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbReadTxn { dbs: self.dbs, txn }))
    }

    fn write_txn(&self) -> Result<Box<dyn TrustWrite + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(LmdbError::from)?;
        Ok(Box::new(LmdbWriteTxn { dbs: self.dbs, txn }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_store::{Citizen, GroupMutualVerification, VerificationEdge, VerificationRequest};
    use arban_types::{CitizenId, GroupId, Role, Timestamp, TrustLevel, VerificationMethod};
    use std::collections::BTreeMap;

    fn open_temp() -> (tempfile::TempDir, LmdbTrustStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbTrustStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        (dir, store)
    }

    fn edge(store: &LmdbTrustStore, from: &str, to: &str) -> VerificationEdge {
        let mut txn = store.write_txn().unwrap();
        let id = txn.next_edge_id().unwrap();
        let edge = VerificationEdge::new(
            id,
            CitizenId::new(from),
            CitizenId::new(to),
            VerificationMethod::PeerReferral,
            BTreeMap::new(),
            Timestamp::new(10),
        );
        txn.insert_edge(&edge).unwrap();
        txn.commit().unwrap();
        edge
    }

    #[test]
    fn citizen_roundtrip() {
        let (_dir, store) = open_temp();
        let alice = Citizen::new(CitizenId::new("alice"), Role::Ordinary, 5, Timestamp::new(1));
        let mut txn = store.write_txn().unwrap();
        txn.put_citizen(&alice).unwrap();
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        assert_eq!(read.citizen(&CitizenId::new("alice")).unwrap(), Some(alice));
        assert!(read.citizen(&CitizenId::new("bob")).unwrap().is_none());
    }

    #[test]
    fn dropped_write_is_discarded() {
        let (_dir, store) = open_temp();
        {
            let mut txn = store.write_txn().unwrap();
            let c = Citizen::new(CitizenId::new("ghost"), Role::Ordinary, 5, Timestamp::new(1));
            txn.put_citizen(&c).unwrap();
        }
        let read = store.read_txn().unwrap();
        assert!(read.citizens().unwrap().is_empty());
    }

    #[test]
    fn edges_are_indexed_by_both_endpoints() {
        let (_dir, store) = open_temp();
        let ab = edge(&store, "a", "b");
        let ac = edge(&store, "a", "c");
        let cb = edge(&store, "c", "b");

        let read = store.read_txn().unwrap();
        let from_a: Vec<_> = read
            .edges_from(&CitizenId::new("a"))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(from_a, vec![ab.id, ac.id]);

        let to_b: Vec<_> = read
            .edges_to(&CitizenId::new("b"))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(to_b, vec![ab.id, cb.id]);

        assert_eq!(
            read.edge_between(&CitizenId::new("c"), &CitizenId::new("b"))
                .unwrap()
                .map(|e| e.id),
            Some(cb.id)
        );
        assert!(read
            .edge_between(&CitizenId::new("b"), &CitizenId::new("a"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let (_dir, store) = open_temp();
        edge(&store, "a", "b");
        let mut txn = store.write_txn().unwrap();
        let id = txn.next_edge_id().unwrap();
        let dup = VerificationEdge::new(
            id,
            CitizenId::new("a"),
            CitizenId::new("b"),
            VerificationMethod::Administrative,
            BTreeMap::new(),
            Timestamp::new(11),
        );
        let err = txn.insert_edge(&dup).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn suspended_edge_survives_update() {
        let (_dir, store) = open_temp();
        let mut e = edge(&store, "a", "b");
        e.suspend("fraud", Some(CitizenId::new("root")), Timestamp::new(20));

        let mut txn = store.write_txn().unwrap();
        txn.update_edge(&e).unwrap();
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        assert!(read.active_edges_from(&CitizenId::new("a")).unwrap().is_empty());
        assert_eq!(read.edges_from(&CitizenId::new("a")).unwrap().len(), 1);
    }

    #[test]
    fn ids_are_monotonic_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let store = LmdbTrustStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
            let mut txn = store.write_txn().unwrap();
            let id = txn.next_edge_id().unwrap();
            txn.commit().unwrap();
            id
        };
        let store = LmdbTrustStore::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let mut txn = store.write_txn().unwrap();
        assert!(txn.next_edge_id().unwrap() > first);
    }

    #[test]
    fn group_verifications_are_scoped_by_group() {
        let (_dir, store) = open_temp();
        let g1 = GroupId::new("g1");
        let g10 = GroupId::new("g10");
        let mut txn = store.write_txn().unwrap();
        for group in [&g1, &g10] {
            let v = GroupMutualVerification::new(
                group.clone(),
                CitizenId::new("a"),
                CitizenId::new("b"),
                None,
                Timestamp::new(5),
            );
            txn.insert_group_verification(&v).unwrap();
        }
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        assert_eq!(read.group_verifications(&g1).unwrap().len(), 1);
        assert_eq!(read.group_verifications(&g10).unwrap().len(), 1);
    }

    fn member_ids(store: &LmdbTrustStore, group: &GroupId) -> Vec<String> {
        let read = store.read_txn().unwrap();
        read.group_members(group)
            .unwrap()
            .into_iter()
            .map(|c| c.id.as_str().to_string())
            .collect()
    }

    fn move_citizen(store: &LmdbTrustStore, id: &str, group: Option<&GroupId>) {
        let mut txn = store.write_txn().unwrap();
        let mut citizen = txn
            .citizen(&CitizenId::new(id))
            .unwrap()
            .unwrap_or_else(|| Citizen::new(CitizenId::new(id), Role::Ordinary, 5, Timestamp::new(1)));
        citizen.current_group = group.cloned();
        txn.put_citizen(&citizen).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn group_membership_follows_join_leave_and_rejoin() {
        let (_dir, store) = open_temp();
        let g1 = GroupId::new("g1");
        let g10 = GroupId::new("g10");

        move_citizen(&store, "alice", Some(&g1));
        move_citizen(&store, "bob", Some(&g1));
        move_citizen(&store, "carol", Some(&g10));
        move_citizen(&store, "dave", None);
        assert_eq!(member_ids(&store, &g1), vec!["alice", "bob"]);
        assert_eq!(member_ids(&store, &g10), vec!["carol"]);

        move_citizen(&store, "alice", None);
        assert_eq!(member_ids(&store, &g1), vec!["bob"]);

        move_citizen(&store, "alice", Some(&g1));
        assert_eq!(member_ids(&store, &g1), vec!["alice", "bob"]);

        move_citizen(&store, "bob", Some(&g10));
        assert_eq!(member_ids(&store, &g1), vec!["alice"]);
        assert_eq!(member_ids(&store, &g10), vec!["bob", "carol"]);
    }

    #[test]
    fn group_members_see_the_latest_record() {
        let (_dir, store) = open_temp();
        let g1 = GroupId::new("g1");
        move_citizen(&store, "alice", Some(&g1));

        let mut txn = store.write_txn().unwrap();
        let mut alice = txn.citizen(&CitizenId::new("alice")).unwrap().unwrap();
        alice.trust_level = TrustLevel::GroupVerified;
        txn.put_citizen(&alice).unwrap();
        assert_eq!(txn.group_members(&g1).unwrap(), vec![alice.clone()]);
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        assert_eq!(read.group_members(&g1).unwrap(), vec![alice]);
    }

    #[test]
    fn dropped_write_leaves_membership_untouched() {
        let (_dir, store) = open_temp();
        let g1 = GroupId::new("g1");
        move_citizen(&store, "alice", Some(&g1));
        {
            let mut txn = store.write_txn().unwrap();
            let mut alice = txn.citizen(&CitizenId::new("alice")).unwrap().unwrap();
            alice.current_group = None;
            txn.put_citizen(&alice).unwrap();
            assert!(txn.group_members(&g1).unwrap().is_empty());
        }
        assert_eq!(member_ids(&store, &g1), vec!["alice"]);
    }

    #[test]
    fn requests_are_indexed_by_requester() {
        let (_dir, store) = open_temp();
        let mut txn = store.write_txn().unwrap();
        let mut ids = Vec::new();
        for requester in ["al", "alice", "al", "bob"] {
            let id = txn.next_request_id().unwrap();
            let request = VerificationRequest::new(
                id,
                CitizenId::new(requester),
                TrustLevel::ClanVerified,
                "community work".into(),
                Vec::new(),
                Timestamp::new(3),
            );
            txn.put_request(&request).unwrap();
            ids.push(id);
        }
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        let by_al: Vec<_> = read
            .requests_by(&CitizenId::new("al"))
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(by_al, vec![ids[0], ids[2]]);
        assert_eq!(read.requests_by(&CitizenId::new("alice")).unwrap().len(), 1);
        assert!(read.requests_by(&CitizenId::new("carol")).unwrap().is_empty());
        assert_eq!(read.requests().unwrap().len(), 4);
    }

    #[test]
    fn reviewed_request_keeps_a_single_index_entry() {
        let (_dir, store) = open_temp();
        let mut txn = store.write_txn().unwrap();
        let id = txn.next_request_id().unwrap();
        let mut request = VerificationRequest::new(
            id,
            CitizenId::new("alice"),
            TrustLevel::ClanVerified,
            "community work".into(),
            Vec::new(),
            Timestamp::new(3),
        );
        txn.put_request(&request).unwrap();
        request.review_notes = Some("looks good".into());
        txn.put_request(&request).unwrap();

        let mut moved = request.clone();
        moved.requester = CitizenId::new("bob");
        assert!(matches!(
            txn.put_request(&moved).unwrap_err(),
            StoreError::InvalidKey(_)
        ));
        txn.commit().unwrap();

        let read = store.read_txn().unwrap();
        let by_alice = read.requests_by(&CitizenId::new("alice")).unwrap();
        assert_eq!(by_alice.len(), 1);
        assert_eq!(by_alice[0].review_notes.as_deref(), Some("looks good"));
        assert!(read.requests_by(&CitizenId::new("bob")).unwrap().is_empty());
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let (_dir, store) = open_temp();
        let mut txn = store.write_txn().unwrap();
        let bad = Citizen::new(CitizenId::new("a\0b"), Role::Ordinary, 5, Timestamp::new(1));
        assert!(matches!(
            txn.put_citizen(&bad).unwrap_err(),
            StoreError::InvalidKey(_)
        ));
    }
}
