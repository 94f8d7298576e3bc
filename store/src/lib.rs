//! Record types and transactional storage traits for the Arban trust graph.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these traits.
//! The engines depend only on the traits and run each operation against a
//! single transaction, so a failed operation leaves nothing behind.

pub mod citizen;
pub mod edge;
pub mod error;
pub mod group;
pub mod request;

pub use citizen::Citizen;
pub use edge::VerificationEdge;
pub use error::StoreError;
pub use group::GroupMutualVerification;
pub use request::VerificationRequest;

use arban_types::{CitizenId, EdgeId, GroupId, RequestId};

/// Read access to the trust store, against a consistent snapshot.
///
/// List methods return records ordered by key: edges and requests by id,
/// citizens by id, group verifications by `(verifier, verified)`.
pub trait TrustRead {
    fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, StoreError>;

    fn citizens(&self) -> Result<Vec<Citizen>, StoreError>;

    /// Citizens whose `current_group` is `group`.
    fn group_members(&self, group: &GroupId) -> Result<Vec<Citizen>, StoreError>;

    fn edge(&self, id: EdgeId) -> Result<Option<VerificationEdge>, StoreError>;

    /// The edge for the ordered pair, active or not.
    fn edge_between(
        &self,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<VerificationEdge>, StoreError>;

    /// Every edge granted by `verifier`, active or not.
    fn edges_from(&self, verifier: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError>;

    /// Every edge received by `verified`, active or not.
    fn edges_to(&self, verified: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError>;

    fn request(&self, id: RequestId) -> Result<Option<VerificationRequest>, StoreError>;

    fn requests(&self) -> Result<Vec<VerificationRequest>, StoreError>;

    /// Every request filed by `requester`, in id order.
    fn requests_by(&self, requester: &CitizenId) -> Result<Vec<VerificationRequest>, StoreError> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|r| &r.requester == requester)
            .collect())
    }

    fn group_verification(
        &self,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<GroupMutualVerification>, StoreError>;

    fn group_verifications(
        &self,
        group: &GroupId,
    ) -> Result<Vec<GroupMutualVerification>, StoreError>;

    fn active_edges_from(&self, verifier: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        Ok(self
            .edges_from(verifier)?
            .into_iter()
            .filter(|e| e.is_active)
            .collect())
    }

    fn active_edges_to(&self, verified: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
        Ok(self
            .edges_to(verified)?
            .into_iter()
            .filter(|e| e.is_active)
            .collect())
    }
}

/// Exclusive write access. Dropping the transaction without calling
/// [`TrustWrite::commit`] discards every change made through it.
pub trait TrustWrite: TrustRead {
    fn put_citizen(&mut self, citizen: &Citizen) -> Result<(), StoreError>;

    fn next_edge_id(&mut self) -> Result<EdgeId, StoreError>;

    /// Insert a new edge. Fails with [`StoreError::Duplicate`] if an edge for the
    /// same ordered pair (or the same id) already exists.
    fn insert_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError>;

    /// Overwrite an existing edge. The ordered pair must not change.
    fn update_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError>;

    fn next_request_id(&mut self) -> Result<RequestId, StoreError>;

    fn put_request(&mut self, request: &VerificationRequest) -> Result<(), StoreError>;

    /// Insert a new group verification. Fails with [`StoreError::Duplicate`] if
    /// `(group, verifier, verified)` already exists.
    fn insert_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError>;

    fn update_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// A trust store backend. Write transactions are serialized store-wide.
pub trait TrustStore: Send + Sync {
    fn read_txn(&self) -> Result<Box<dyn TrustRead + '_>, StoreError>;

    fn write_txn(&self) -> Result<Box<dyn TrustWrite + '_>, StoreError>;
}
