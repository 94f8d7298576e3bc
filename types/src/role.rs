//! Citizen roles and the authorization predicates derived from them.
//!
//! Every capability check in the workspace goes through one of the predicates
//! below rather than comparing roles inline.

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The authority a citizen holds, as reported by the role directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A regular citizen. Bound by a verification quota.
    Ordinary,
    /// An elevated reviewer (administrator). May revoke, approve, and verify without limit.
    Reviewer,
    /// The supreme role. Root of the trust graph; may override levels directly.
    Supreme,
}

impl Role {
    /// Whether this role sits above ordinary citizens.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Reviewer | Self::Supreme)
    }

    /// Whether this role may vouch for others without holding an inbound edge.
    pub fn can_verify_without_standing(&self) -> bool {
        self.is_elevated()
    }

    /// Whether outbound verifications are exempt from the per-citizen quota.
    pub fn has_unlimited_verification_quota(&self) -> bool {
        self.is_elevated()
    }

    /// Whether this role may create edges with the administrative method.
    pub fn can_verify_administratively(&self) -> bool {
        self.is_elevated()
    }

    /// Whether this role may revoke other citizens' verification edges.
    pub fn can_revoke(&self) -> bool {
        self.is_elevated()
    }

    /// Whether this role may review level-upgrade requests.
    pub fn can_approve(&self) -> bool {
        self.is_elevated()
    }

    /// Whether this role may set any trust level directly.
    pub fn can_override_level(&self) -> bool {
        matches!(self, Self::Supreme)
    }

    /// Whether currency creation is unbounded regardless of level.
    pub fn has_unlimited_emission(&self) -> bool {
        matches!(self, Self::Supreme)
    }

    /// Trust roots terminate chain walks and are never unverified by a cascade.
    pub fn is_trust_root(&self) -> bool {
        matches!(self, Self::Supreme)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ordinary => "ordinary",
            Self::Reviewer => "reviewer",
            Self::Supreme => "supreme",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ordinary" | "citizen" => Ok(Self::Ordinary),
            "reviewer" | "elevated" | "admin" => Ok(Self::Reviewer),
            "supreme" | "creator" => Ok(Self::Supreme),
            other => Err(ParseError::Role(other.to_string())),
        }
    }
}
