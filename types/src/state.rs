//! State enums for citizens, edges, and upgrade requests.

use crate::error::ParseError;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A citizen's trust tier. Variants are declared in strict ascending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustLevel {
    /// Initial tier.
    Unverified,
    /// Unlocked when the citizen's 5-member group completes mutual verification.
    GroupVerified,
    /// Granted by an approved request from a group-verified citizen.
    ClanVerified,
    /// Granted by an approved request from a clan-verified citizen.
    FullyVerified,
}

impl TrustLevel {
    pub const ALL: [TrustLevel; 4] = [
        Self::Unverified,
        Self::GroupVerified,
        Self::ClanVerified,
        Self::FullyVerified,
    ];

    /// The level immediately above this one.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Unverified => Some(Self::GroupVerified),
            Self::GroupVerified => Some(Self::ClanVerified),
            Self::ClanVerified => Some(Self::FullyVerified),
            Self::FullyVerified => None,
        }
    }

    /// The level immediately below this one.
    pub fn previous(&self) -> Option<Self> {
        match self {
            Self::Unverified => None,
            Self::GroupVerified => Some(Self::Unverified),
            Self::ClanVerified => Some(Self::GroupVerified),
            Self::FullyVerified => Some(Self::ClanVerified),
        }
    }

    /// Whether a citizen may ask a reviewer for this level.
    ///
    /// `GroupVerified` is reached only through group completeness.
    pub fn is_requestable(&self) -> bool {
        matches!(self, Self::ClanVerified | Self::FullyVerified)
    }

    /// Whether the emission limit at this level is shared by the citizen's group.
    pub fn is_group_pooled(&self) -> bool {
        matches!(self, Self::GroupVerified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "UNVERIFIED",
            Self::GroupVerified => "GROUP_VERIFIED",
            Self::ClanVerified => "CLAN_VERIFIED",
            Self::FullyVerified => "FULLY_VERIFIED",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrustLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "UNVERIFIED" => Ok(Self::Unverified),
            "GROUP_VERIFIED" | "ARBAN_VERIFIED" => Ok(Self::GroupVerified),
            "CLAN_VERIFIED" | "ZUN_VERIFIED" => Ok(Self::ClanVerified),
            "FULLY_VERIFIED" => Ok(Self::FullyVerified),
            other => Err(ParseError::Level(other.to_string())),
        }
    }
}

/// What put a citizen at their current level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelSource {
    /// Level assigned at registration.
    Initial,
    /// Group completeness promoted (or demoted) the citizen.
    Group,
    /// An upgrade request was approved.
    Review,
    /// A supreme-role actor set the level directly.
    Override,
    /// Startup reconciliation of trust roots.
    Bootstrap,
}

/// How a verification edge was granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationMethod {
    /// Granted by an elevated or supreme citizen.
    Administrative,
    /// Granted by a verified peer out of their quota.
    PeerReferral,
}

impl VerificationMethod {
    /// The method used when a caller does not name one.
    pub fn default_for(role: Role) -> Self {
        if role.can_verify_administratively() {
            Self::Administrative
        } else {
            Self::PeerReferral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrative => "administrative",
            Self::PeerReferral => "peer-referral",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "administrative" | "admin" => Ok(Self::Administrative),
            "peer-referral" | "user-referral" | "peer" => Ok(Self::PeerReferral),
            other => Err(ParseError::Method(other.to_string())),
        }
    }
}

/// Lifecycle of a level-upgrade request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_strictly_ordered() {
        for pair in TrustLevel::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
        }
        assert_eq!(TrustLevel::FullyVerified.next(), None);
        assert_eq!(TrustLevel::Unverified.previous(), None);
    }

    #[test]
    fn only_clan_and_full_are_requestable() {
        assert!(!TrustLevel::Unverified.is_requestable());
        assert!(!TrustLevel::GroupVerified.is_requestable());
        assert!(TrustLevel::ClanVerified.is_requestable());
        assert!(TrustLevel::FullyVerified.is_requestable());
    }

    #[test]
    fn default_method_follows_role() {
        assert_eq!(
            VerificationMethod::default_for(Role::Ordinary),
            VerificationMethod::PeerReferral
        );
        assert_eq!(
            VerificationMethod::default_for(Role::Reviewer),
            VerificationMethod::Administrative
        );
    }

    #[test]
    fn level_parses_legacy_names() {
        assert_eq!(
            "zun_verified".parse::<TrustLevel>().unwrap(),
            TrustLevel::ClanVerified
        );
        assert_eq!(
            "group-verified".parse::<TrustLevel>().unwrap(),
            TrustLevel::GroupVerified
        );
    }
}
