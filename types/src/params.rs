//! Trust parameters: every tunable the engines consult.
//!
//! Loaded from the `[params]` table of the service configuration; any field left
//! out falls back to the defaults below.

use crate::emission::EmissionLimit;
use crate::role::Role;
use crate::state::TrustLevel;
use serde::{Deserialize, Serialize};

/// All trust-graph parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustParams {
    // ── Groups ───────────────────────────────────────────────────────────
    /// Exact member count of a trust group.
    pub group_size: usize,

    // ── Verification ─────────────────────────────────────────────────────
    /// Outbound edges an ordinary citizen may grant.
    pub default_verification_quota: u32,

    /// Maximum number of cascade levels processed for one root cause.
    ///
    /// A safety bound against pathological or cyclic data; treated as tunable.
    pub cascade_depth_limit: u32,

    /// Maximum hops walked when computing a verification chain.
    pub chain_depth_limit: u32,

    // ── Emission ─────────────────────────────────────────────────────────
    /// Cumulative emission allowed to an `UNVERIFIED` citizen.
    pub unverified_emission_limit: u128,

    /// Cumulative emission shared by a `GROUP_VERIFIED` citizen's group.
    pub group_emission_limit: u128,
}

impl TrustParams {
    /// Arban defaults.
    pub fn arban_defaults() -> Self {
        Self {
            group_size: 5,
            default_verification_quota: 5,
            cascade_depth_limit: 10,
            chain_depth_limit: 10,
            unverified_emission_limit: 100,
            group_emission_limit: 1_000,
        }
    }

    /// Directed edges needed for a group to be complete: every member verifies
    /// every other member once (`5 × 4 = 20`).
    pub fn required_mutual_verifications(&self) -> usize {
        self.group_size * self.group_size.saturating_sub(1)
    }

    /// Emission limit for a citizen at `level` holding `role`.
    pub fn emission_limit(&self, level: TrustLevel, role: Role) -> EmissionLimit {
        if role.has_unlimited_emission() {
            return EmissionLimit::Unbounded;
        }
        match level {
            TrustLevel::Unverified => EmissionLimit::Limited(self.unverified_emission_limit),
            TrustLevel::GroupVerified => EmissionLimit::Limited(self.group_emission_limit),
            TrustLevel::ClanVerified | TrustLevel::FullyVerified => EmissionLimit::Unbounded,
        }
    }

    /// Reject parameter sets the engines cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if self.group_size < 2 {
            return Err(format!("group_size must be at least 2, got {}", self.group_size));
        }
        if self.cascade_depth_limit == 0 {
            return Err("cascade_depth_limit must be at least 1".into());
        }
        if self.chain_depth_limit == 0 {
            return Err("chain_depth_limit must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for TrustParams {
    fn default() -> Self {
        Self::arban_defaults()
    }
}
