//! Verification edges: the directed trust graph.
//!
//! Edges are append-only: revocation flips `is_active` and records why, the
//! row itself is never removed.

use arban_types::{CitizenId, EdgeId, Timestamp, VerificationMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEdge {
    pub id: EdgeId,
    pub verifier: CitizenId,
    pub verified: CitizenId,
    pub method: VerificationMethod,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub suspended_at: Option<Timestamp>,
    pub suspended_reason: Option<String>,
    pub suspended_by: Option<CitizenId>,
    /// Free-form context captured at creation (notes, location, client info).
    pub metadata: BTreeMap<String, String>,
}

impl VerificationEdge {
    pub fn new(
        id: EdgeId,
        verifier: CitizenId,
        verified: CitizenId,
        method: VerificationMethod,
        metadata: BTreeMap<String, String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            verifier,
            verified,
            method,
            is_active: true,
            created_at: now,
            suspended_at: None,
            suspended_reason: None,
            suspended_by: None,
            metadata,
        }
    }

    /// Mark the edge inactive. Returns `false` if it already was, leaving it untouched.
    pub fn suspend(
        &mut self,
        reason: impl Into<String>,
        by: Option<CitizenId>,
        now: Timestamp,
    ) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.suspended_at = Some(now);
        self.suspended_reason = Some(reason.into());
        self.suspended_by = by;
        true
    }
}
