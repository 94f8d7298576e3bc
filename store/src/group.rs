//! Mutual verification edges inside a trust group.

use arban_types::{CitizenId, GroupId, Timestamp};
use serde::{Deserialize, Serialize};

/// One member vouching for another inside `group`. Unique per
/// `(group, verifier, verified)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMutualVerification {
    pub group: GroupId,
    pub verifier: CitizenId,
    pub verified: CitizenId,
    pub is_verified: bool,
    pub verified_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub notes: Option<String>,
}

impl GroupMutualVerification {
    pub fn new(
        group: GroupId,
        verifier: CitizenId,
        verified: CitizenId,
        notes: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            group,
            verifier,
            verified,
            is_verified: true,
            verified_at: now,
            revoked_at: None,
            notes,
        }
    }

    /// Counts toward completeness.
    pub fn is_active(&self) -> bool {
        self.is_verified && self.revoked_at.is_none()
    }

    /// Returns `false` if already revoked.
    pub fn revoke(&mut self, now: Timestamp) -> bool {
        if !self.is_active() {
            return false;
        }
        self.is_verified = false;
        self.revoked_at = Some(now);
        true
    }

    /// Bring a revoked verification back.
    pub fn reactivate(&mut self, notes: Option<String>, now: Timestamp) {
        self.is_verified = true;
        self.verified_at = now;
        self.revoked_at = None;
        if notes.is_some() {
            self.notes = notes;
        }
    }
}
