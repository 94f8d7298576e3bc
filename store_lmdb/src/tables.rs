//! Named databases and the reads shared by both transaction kinds.

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use arban_store::{Citizen, GroupMutualVerification, VerificationEdge, VerificationRequest};
use arban_types::{CitizenId, EdgeId, GroupId, RequestId};

use crate::keys;
use crate::LmdbError;

/// Number of named databases the trust store creates.
pub(crate) const DATABASE_COUNT: u32 = 10;

#[derive(Clone, Copy)]
pub(crate) struct Databases {
    pub citizens: Database<Bytes, Bytes>,
    pub edges: Database<Bytes, Bytes>,
    pub edge_pairs: Database<Bytes, Bytes>,
    pub edges_by_verifier: Database<Bytes, Bytes>,
    pub edges_by_verified: Database<Bytes, Bytes>,
    pub requests: Database<Bytes, Bytes>,
    pub requests_by_requester: Database<Bytes, Bytes>,
    pub group_members: Database<Bytes, Bytes>,
    pub group_verifications: Database<Bytes, Bytes>,
    pub meta: Database<Bytes, Bytes>,
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, LmdbError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LmdbError> {
    Ok(bincode::deserialize(bytes)?)
}

impl Databases {
    pub fn create(env: &Env, wtxn: &mut RwTxn<'_>) -> Result<Self, LmdbError> {
        Ok(Self {
            citizens: env.create_database(wtxn, Some("citizens"))?,
            edges: env.create_database(wtxn, Some("edges"))?,
            edge_pairs: env.create_database(wtxn, Some("edge_pairs"))?,
            edges_by_verifier: env.create_database(wtxn, Some("edges_by_verifier"))?,
            edges_by_verified: env.create_database(wtxn, Some("edges_by_verified"))?,
            requests: env.create_database(wtxn, Some("requests"))?,
            requests_by_requester: env.create_database(wtxn, Some("requests_by_requester"))?,
            group_members: env.create_database(wtxn, Some("group_members"))?,
            group_verifications: env.create_database(wtxn, Some("group_verifications"))?,
            meta: env.create_database(wtxn, Some("meta"))?,
        })
    }

    pub fn citizen(&self, txn: &RoTxn<'_>, id: &CitizenId) -> Result<Option<Citizen>, LmdbError> {
        self.citizens
            .get(txn, keys::citizen_key(id)?)?
            .map(decode)
            .transpose()
    }

    pub fn citizens(&self, txn: &RoTxn<'_>) -> Result<Vec<Citizen>, LmdbError> {
        let mut out = Vec::new();
        for result in self.citizens.iter(txn)? {
            let (_, val) = result?;
            out.push(decode(val)?);
        }
        Ok(out)
    }

    pub fn group_members(
        &self,
        txn: &RoTxn<'_>,
        group: &GroupId,
    ) -> Result<Vec<Citizen>, LmdbError> {
        let prefix = keys::group_prefix(group)?;
        let mut ids = Vec::new();
        for result in self.group_members.prefix_iter(txn, &prefix)? {
            let (key, _) = result?;
            ids.push(keys::member_suffix(key, prefix.len())?);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let citizen = self.citizen(txn, &id)?.ok_or_else(|| {
                LmdbError::Corruption(format!("group {group} lists missing citizen {id}"))
            })?;
            out.push(citizen);
        }
        Ok(out)
    }

    pub fn edge(&self, txn: &RoTxn<'_>, id: EdgeId) -> Result<Option<VerificationEdge>, LmdbError> {
        self.edges
            .get(txn, &id.to_be_bytes())?
            .map(decode)
            .transpose()
    }

    pub fn edge_id_between(
        &self,
        txn: &RoTxn<'_>,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<EdgeId>, LmdbError> {
        self.edge_pairs
            .get(txn, &keys::pair_key(verifier, verified)?)?
            .map(|raw| keys::decode_u64(raw).map(EdgeId::new))
            .transpose()
    }

    pub fn edge_between(
        &self,
        txn: &RoTxn<'_>,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<VerificationEdge>, LmdbError> {
        match self.edge_id_between(txn, verifier, verified)? {
            Some(id) => {
                let edge = self.edge(txn, id)?.ok_or_else(|| {
                    LmdbError::Corruption(format!("pair index points at missing {id}"))
                })?;
                Ok(Some(edge))
            }
            None => Ok(None),
        }
    }

    /// Resolve every edge listed under `citizen` in an endpoint index.
    pub fn indexed_edges(
        &self,
        txn: &RoTxn<'_>,
        index: Database<Bytes, Bytes>,
        citizen: &CitizenId,
    ) -> Result<Vec<VerificationEdge>, LmdbError> {
        let prefix = keys::citizen_prefix(citizen)?;
        let mut ids = Vec::new();
        for result in index.prefix_iter(txn, &prefix)? {
            let (key, _) = result?;
            ids.push(keys::edge_id_suffix(key)?);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let edge = self.edge(txn, id)?.ok_or_else(|| {
                LmdbError::Corruption(format!("endpoint index points at missing {id}"))
            })?;
            out.push(edge);
        }
        Ok(out)
    }

    pub fn request(
        &self,
        txn: &RoTxn<'_>,
        id: RequestId,
    ) -> Result<Option<VerificationRequest>, LmdbError> {
        self.requests
            .get(txn, &id.to_be_bytes())?
            .map(decode)
            .transpose()
    }

    pub fn requests(&self, txn: &RoTxn<'_>) -> Result<Vec<VerificationRequest>, LmdbError> {
        let mut out = Vec::new();
        for result in self.requests.iter(txn)? {
            let (_, val) = result?;
            out.push(decode(val)?);
        }
        Ok(out)
    }

    pub fn requests_by(
        &self,
        txn: &RoTxn<'_>,
        requester: &CitizenId,
    ) -> Result<Vec<VerificationRequest>, LmdbError> {
        let prefix = keys::citizen_prefix(requester)?;
        let mut ids = Vec::new();
        for result in self.requests_by_requester.prefix_iter(txn, &prefix)? {
            let (key, _) = result?;
            ids.push(keys::request_id_suffix(key)?);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let request = self.request(txn, id)?.ok_or_else(|| {
                LmdbError::Corruption(format!("requester index points at missing {id}"))
            })?;
            out.push(request);
        }
        Ok(out)
    }

    pub fn group_verification(
        &self,
        txn: &RoTxn<'_>,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
    ) -> Result<Option<GroupMutualVerification>, LmdbError> {
        self.group_verifications
            .get(txn, &keys::group_verification_key(group, verifier, verified)?)?
            .map(decode)
            .transpose()
    }

    pub fn group_verifications(
        &self,
        txn: &RoTxn<'_>,
        group: &GroupId,
    ) -> Result<Vec<GroupMutualVerification>, LmdbError> {
        let prefix = keys::group_prefix(group)?;
        let mut out = Vec::new();
        for result in self.group_verifications.prefix_iter(txn, &prefix)? {
            let (_, val) = result?;
            out.push(decode(val)?);
        }
        Ok(out)
    }

    /// Read a counter from the meta table. Missing counters start at zero.
    pub fn counter(&self, txn: &RoTxn<'_>, key: &[u8]) -> Result<u64, LmdbError> {
        match self.meta.get(txn, key)? {
            Some(raw) => keys::decode_u64(raw),
            None => Ok(0),
        }
    }
}
