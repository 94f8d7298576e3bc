//! Read and write transactions over the trust databases.

use heed::RwTxn;
use heed::RoTxn;

use arban_store::{
    Citizen, GroupMutualVerification, StoreError, TrustRead, TrustWrite, VerificationEdge,
    VerificationRequest,
};
use arban_types::{CitizenId, EdgeId, GroupId, RequestId};

use crate::keys;
use crate::tables::{encode, Databases};
use crate::LmdbError;

pub(crate) struct LmdbReadTxn<'env> {
    pub(crate) dbs: Databases,
    pub(crate) txn: RoTxn<'env>,
}

/// A write transaction. Dropped without commit, LMDB aborts it.
pub(crate) struct LmdbWriteTxn<'env> {
    pub(crate) dbs: Databases,
    pub(crate) txn: RwTxn<'env>,
}

macro_rules! impl_trust_read {
    ($ty:ident) => {
        impl TrustRead for $ty<'_> {
            fn citizen(&self, id: &CitizenId) -> Result<Option<Citizen>, StoreError> {
                Ok(self.dbs.citizen(&self.txn, id)?)
            }

            fn citizens(&self) -> Result<Vec<Citizen>, StoreError> {
                Ok(self.dbs.citizens(&self.txn)?)
            }

            fn group_members(&self, group: &GroupId) -> Result<Vec<Citizen>, StoreError> {
                Ok(self.dbs.group_members(&self.txn, group)?)
            }

            fn edge(&self, id: EdgeId) -> Result<Option<VerificationEdge>, StoreError> {
                Ok(self.dbs.edge(&self.txn, id)?)
            }

            fn edge_between(
                &self,
                verifier: &CitizenId,
                verified: &CitizenId,
            ) -> Result<Option<VerificationEdge>, StoreError> {
                Ok(self.dbs.edge_between(&self.txn, verifier, verified)?)
            }

            fn edges_from(
                &self,
                verifier: &CitizenId,
            ) -> Result<Vec<VerificationEdge>, StoreError> {
                Ok(self
                    .dbs
                    .indexed_edges(&self.txn, self.dbs.edges_by_verifier, verifier)?)
            }

            fn edges_to(&self, verified: &CitizenId) -> Result<Vec<VerificationEdge>, StoreError> {
                Ok(self
                    .dbs
                    .indexed_edges(&self.txn, self.dbs.edges_by_verified, verified)?)
            }

            fn request(&self, id: RequestId) -> Result<Option<VerificationRequest>, StoreError> {
                Ok(self.dbs.request(&self.txn, id)?)
            }

            fn requests(&self) -> Result<Vec<VerificationRequest>, StoreError> {
                Ok(self.dbs.requests(&self.txn)?)
            }

            fn requests_by(
                &self,
                requester: &CitizenId,
            ) -> Result<Vec<VerificationRequest>, StoreError> {
                Ok(self.dbs.requests_by(&self.txn, requester)?)
            }

            fn group_verification(
                &self,
                group: &GroupId,
                verifier: &CitizenId,
                verified: &CitizenId,
            ) -> Result<Option<GroupMutualVerification>, StoreError> {
                Ok(self
                    .dbs
                    .group_verification(&self.txn, group, verifier, verified)?)
            }

            fn group_verifications(
                &self,
                group: &GroupId,
            ) -> Result<Vec<GroupMutualVerification>, StoreError> {
                Ok(self.dbs.group_verifications(&self.txn, group)?)
            }
        }
    };
}

impl_trust_read!(LmdbReadTxn);
impl_trust_read!(LmdbWriteTxn);

impl LmdbWriteTxn<'_> {
    fn bump_counter(&mut self, key: &[u8]) -> Result<u64, LmdbError> {
        let next = self
            .dbs
            .counter(&self.txn, key)?
            .checked_add(1)
            .ok_or_else(|| LmdbError::Corruption("id counter overflow".into()))?;
        self.dbs.meta.put(&mut self.txn, key, &next.to_be_bytes())?;
        Ok(next)
    }

    fn put_edge_record(&mut self, edge: &VerificationEdge) -> Result<(), LmdbError> {
        let bytes = encode(edge)?;
        self.dbs.edges.put(&mut self.txn, &edge.id.to_be_bytes(), &bytes)?;
        Ok(())
    }
}

impl TrustWrite for LmdbWriteTxn<'_> {
    fn put_citizen(&mut self, citizen: &Citizen) -> Result<(), StoreError> {
        let key = keys::citizen_key(&citizen.id)?;
        let previous_group = self
            .dbs
            .citizen(&self.txn, &citizen.id)?
            .and_then(|old| old.current_group);
        let bytes = encode(citizen)?;
        self.dbs
            .citizens
            .put(&mut self.txn, key, &bytes)
            .map_err(LmdbError::from)?;

        if previous_group != citizen.current_group {
            if let Some(old) = &previous_group {
                let stale = keys::group_member_key(old, &citizen.id)?;
                self.dbs
                    .group_members
                    .delete(&mut self.txn, &stale)
                    .map_err(LmdbError::from)?;
            }
            if let Some(new) = &citizen.current_group {
                let member = keys::group_member_key(new, &citizen.id)?;
                self.dbs
                    .group_members
                    .put(&mut self.txn, &member, &[])
                    .map_err(LmdbError::from)?;
            }
        }
        Ok(())
    }

    fn next_edge_id(&mut self) -> Result<EdgeId, StoreError> {
        Ok(EdgeId::new(self.bump_counter(keys::NEXT_EDGE_ID)?))
    }

    fn insert_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError> {
        let pair = keys::pair_key(&edge.verifier, &edge.verified)?;
        if self
            .dbs
            .edge_pairs
            .get(&self.txn, &pair)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(LmdbError::Duplicate(format!(
                "edge {} -> {}",
                edge.verifier, edge.verified
            ))
            .into());
        }
        if self.dbs.edge(&self.txn, edge.id)?.is_some() {
            return Err(LmdbError::Duplicate(edge.id.to_string()).into());
        }

        let by_verifier = keys::endpoint_key(&edge.verifier, edge.id)?;
        let by_verified = keys::endpoint_key(&edge.verified, edge.id)?;
        self.put_edge_record(edge)?;
        self.dbs
            .edge_pairs
            .put(&mut self.txn, &pair, &edge.id.to_be_bytes())
            .map_err(LmdbError::from)?;
        self.dbs
            .edges_by_verifier
            .put(&mut self.txn, &by_verifier, &[])
            .map_err(LmdbError::from)?;
        self.dbs
            .edges_by_verified
            .put(&mut self.txn, &by_verified, &[])
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn update_edge(&mut self, edge: &VerificationEdge) -> Result<(), StoreError> {
        let existing = self
            .dbs
            .edge(&self.txn, edge.id)?
            .ok_or_else(|| LmdbError::NotFound(edge.id.to_string()))?;
        if existing.verifier != edge.verifier || existing.verified != edge.verified {
            return Err(LmdbError::InvalidKey(format!("{} cannot change endpoints", edge.id)).into());
        }
        self.put_edge_record(edge)?;
        Ok(())
    }

    fn next_request_id(&mut self) -> Result<RequestId, StoreError> {
        Ok(RequestId::new(self.bump_counter(keys::NEXT_REQUEST_ID)?))
    }

    fn put_request(&mut self, request: &VerificationRequest) -> Result<(), StoreError> {
        let by_requester = keys::requester_key(&request.requester, request.id)?;
        if let Some(existing) = self.dbs.request(&self.txn, request.id)? {
            if existing.requester != request.requester {
                return Err(
                    LmdbError::InvalidKey(format!("{} cannot change requester", request.id)).into(),
                );
            }
        }
        let bytes = encode(request)?;
        self.dbs
            .requests
            .put(&mut self.txn, &request.id.to_be_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.dbs
            .requests_by_requester
            .put(&mut self.txn, &by_requester, &[])
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn insert_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError> {
        let key = keys::group_verification_key(
            &verification.group,
            &verification.verifier,
            &verification.verified,
        )?;
        if self
            .dbs
            .group_verifications
            .get(&self.txn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(LmdbError::Duplicate(format!(
                "group {} verification {} -> {}",
                verification.group, verification.verifier, verification.verified
            ))
            .into());
        }
        let bytes = encode(verification)?;
        self.dbs
            .group_verifications
            .put(&mut self.txn, &key, &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn update_group_verification(
        &mut self,
        verification: &GroupMutualVerification,
    ) -> Result<(), StoreError> {
        let key = keys::group_verification_key(
            &verification.group,
            &verification.verifier,
            &verification.verified,
        )?;
        if self
            .dbs
            .group_verifications
            .get(&self.txn, &key)
            .map_err(LmdbError::from)?
            .is_none()
        {
            return Err(LmdbError::NotFound(format!(
                "group {} verification {} -> {}",
                verification.group, verification.verifier, verification.verified
            ))
            .into());
        }
        let bytes = encode(verification)?;
        self.dbs
            .group_verifications
            .put(&mut self.txn, &key, &bytes)
            .map_err(LmdbError::from)?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
