//! Key layouts.
//!
//! Composite keys join string ids with a NUL separator, which is why ids
//! containing NUL are rejected before they reach the store. Numeric ids are
//! big-endian so range scans come back in id order.

use crate::LmdbError;
use arban_types::{CitizenId, EdgeId, GroupId, RequestId};

pub(crate) const NEXT_EDGE_ID: &[u8] = b"next_edge_id";
pub(crate) const NEXT_REQUEST_ID: &[u8] = b"next_request_id";

const SEP: u8 = 0;

pub(crate) fn citizen_key(id: &CitizenId) -> Result<&[u8], LmdbError> {
    if !id.is_valid() {
        return Err(LmdbError::InvalidKey(format!("citizen id {:?}", id.as_str())));
    }
    Ok(id.as_str().as_bytes())
}

fn group_part(id: &GroupId) -> Result<&[u8], LmdbError> {
    if !id.is_valid() {
        return Err(LmdbError::InvalidKey(format!("group id {:?}", id.as_str())));
    }
    Ok(id.as_str().as_bytes())
}

/// `citizen ++ NUL`: prefix of every index entry for that citizen.
pub(crate) fn citizen_prefix(id: &CitizenId) -> Result<Vec<u8>, LmdbError> {
    let mut key = citizen_key(id)?.to_vec();
    key.push(SEP);
    Ok(key)
}

/// `verifier ++ NUL ++ verified`: the unique pair index.
pub(crate) fn pair_key(verifier: &CitizenId, verified: &CitizenId) -> Result<Vec<u8>, LmdbError> {
    let mut key = citizen_prefix(verifier)?;
    key.extend_from_slice(citizen_key(verified)?);
    Ok(key)
}

/// `citizen ++ NUL ++ edge_id_be`: per-endpoint edge index.
pub(crate) fn endpoint_key(citizen: &CitizenId, edge: EdgeId) -> Result<Vec<u8>, LmdbError> {
    let mut key = citizen_prefix(citizen)?;
    key.extend_from_slice(&edge.to_be_bytes());
    Ok(key)
}

fn u64_suffix(key: &[u8]) -> Result<u64, LmdbError> {
    let tail = key
        .len()
        .checked_sub(8)
        .map(|start| &key[start..])
        .ok_or_else(|| LmdbError::Corruption("index key too short".into()))?;
    let bytes: [u8; 8] = tail
        .try_into()
        .map_err(|_| LmdbError::Corruption("index key too short".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// The edge id at the tail of an endpoint index key.
pub(crate) fn edge_id_suffix(key: &[u8]) -> Result<EdgeId, LmdbError> {
    u64_suffix(key).map(EdgeId::new)
}

/// `requester ++ NUL ++ request_id_be`: per-requester request index.
pub(crate) fn requester_key(requester: &CitizenId, request: RequestId) -> Result<Vec<u8>, LmdbError> {
    let mut key = citizen_prefix(requester)?;
    key.extend_from_slice(&request.to_be_bytes());
    Ok(key)
}

pub(crate) fn request_id_suffix(key: &[u8]) -> Result<RequestId, LmdbError> {
    u64_suffix(key).map(RequestId::new)
}

/// `group ++ NUL`: prefix of every mutual verification in a group.
pub(crate) fn group_prefix(group: &GroupId) -> Result<Vec<u8>, LmdbError> {
    let mut key = group_part(group)?.to_vec();
    key.push(SEP);
    Ok(key)
}

/// `group ++ NUL ++ verifier ++ NUL ++ verified`.
pub(crate) fn group_verification_key(
    group: &GroupId,
    verifier: &CitizenId,
    verified: &CitizenId,
) -> Result<Vec<u8>, LmdbError> {
    let mut key = group_prefix(group)?;
    key.extend_from_slice(&pair_key(verifier, verified)?);
    Ok(key)
}

/// `group ++ NUL ++ citizen`: group membership index.
pub(crate) fn group_member_key(group: &GroupId, citizen: &CitizenId) -> Result<Vec<u8>, LmdbError> {
    let mut key = group_prefix(group)?;
    key.extend_from_slice(citizen_key(citizen)?);
    Ok(key)
}

/// The citizen id following a group prefix.
pub(crate) fn member_suffix(key: &[u8], prefix_len: usize) -> Result<CitizenId, LmdbError> {
    let tail = key
        .get(prefix_len..)
        .filter(|tail| !tail.is_empty())
        .ok_or_else(|| LmdbError::Corruption("group member key too short".into()))?;
    let id = std::str::from_utf8(tail)
        .map_err(|e| LmdbError::Corruption(format!("group member key: {e}")))?;
    Ok(CitizenId::new(id))
}

pub(crate) fn decode_u64(bytes: &[u8]) -> Result<u64, LmdbError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LmdbError::Corruption("counter has unexpected byte length".into()))?;
    Ok(u64::from_be_bytes(arr))
}
