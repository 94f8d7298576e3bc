//! Error kinds shared across crates.
//!
//! Each engine crate owns its own error enum; every variant maps onto one of
//! these kinds so callers can branch on the failure class without knowing
//! which engine produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure classes surfaced by the trust engines. All are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Citizen, edge, request, or group verification absent.
    NotFound,
    /// Target already holds an active inbound edge.
    AlreadyVerified,
    /// Self-verification or another self-referencing action.
    SelfReference,
    /// Verifier has no outbound verifications left.
    QuotaExhausted,
    /// Missing prerequisite or wrong current state for the action.
    PreconditionNotMet,
    /// Actor's role does not grant the capability.
    Unauthorized,
    /// An edge already exists for the ordered pair.
    DuplicateEdge,
    /// Request already reviewed, or edge already revoked.
    AlreadyProcessed,
    /// The trust store failed.
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyVerified => "already_verified",
            Self::SelfReference => "self_reference",
            Self::QuotaExhausted => "quota_exhausted",
            Self::PreconditionNotMet => "precondition_not_met",
            Self::Unauthorized => "unauthorized",
            Self::DuplicateEdge => "duplicate_edge",
            Self::AlreadyProcessed => "already_processed",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to parse one of the string forms accepted at the edges (CLI, config).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown role: {0}")]
    Role(String),

    #[error("unknown trust level: {0}")]
    Level(String),

    #[error("unknown verification method: {0}")]
    Method(String),
}
