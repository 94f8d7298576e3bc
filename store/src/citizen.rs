//! Citizen records.

use arban_types::{CitizenId, GroupId, LevelSource, Role, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};

/// A citizen as held in the trust store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: CitizenId,
    pub role: Role,
    pub trust_level: TrustLevel,
    /// What put the citizen at `trust_level`.
    pub level_source: LevelSource,
    pub level_set_at: Option<Timestamp>,
    pub level_set_by: Option<CitizenId>,
    /// Whether at least one active inbound edge exists (or a root override applies).
    pub is_verified: bool,
    pub verified_at: Option<Timestamp>,
    /// Prerequisite consent step; required before anyone may verify this citizen.
    pub consent_accepted_at: Option<Timestamp>,
    /// Active outbound edges counted against the quota.
    pub verifications_given: u32,
    pub verification_quota: u32,
    /// Cumulative currency created by this citizen.
    pub total_emitted: u128,
    /// Current 5-member trust group, if any.
    pub current_group: Option<GroupId>,
    pub group_verified_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Citizen {
    /// A freshly registered, unverified citizen.
    pub fn new(id: CitizenId, role: Role, verification_quota: u32, now: Timestamp) -> Self {
        Self {
            id,
            role,
            trust_level: TrustLevel::Unverified,
            level_source: LevelSource::Initial,
            level_set_at: None,
            level_set_by: None,
            is_verified: false,
            verified_at: None,
            consent_accepted_at: None,
            verifications_given: 0,
            verification_quota,
            total_emitted: 0,
            current_group: None,
            group_verified_at: None,
            created_at: now,
        }
    }

    pub fn has_consented(&self) -> bool {
        self.consent_accepted_at.is_some()
    }

    /// Outbound verifications left, or `None` when the role is unlimited.
    pub fn remaining_quota(&self) -> Option<u32> {
        if self.role.has_unlimited_verification_quota() {
            None
        } else {
            Some(self.verification_quota.saturating_sub(self.verifications_given))
        }
    }

    pub fn has_quota_left(&self) -> bool {
        self.remaining_quota().map_or(true, |left| left > 0)
    }

    pub fn is_member_of(&self, group: &GroupId) -> bool {
        self.current_group.as_ref() == Some(group)
    }
}
