use arban_levels::LevelError;
use arban_store::StoreError;
use arban_types::{CitizenId, ErrorKind, GroupId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),

    #[error("invalid group id {0:?}")]
    InvalidGroupId(GroupId),

    #[error("citizen {citizen} is not a member of group {group}")]
    NotMember { citizen: CitizenId, group: GroupId },

    #[error("citizen {0} is not in any group")]
    NotInGroup(CitizenId),

    #[error("citizen {citizen} already belongs to group {group}")]
    InAnotherGroup { citizen: CitizenId, group: GroupId },

    #[error("citizen {citizen} is already a member of group {group}")]
    AlreadyMember { citizen: CitizenId, group: GroupId },

    #[error("group {group} already has {size} members")]
    GroupFull { group: GroupId, size: usize },

    #[error("a member cannot verify themselves")]
    SelfVerification,

    #[error("{verifier} has already verified {verified} in group {group}")]
    DuplicateVerification {
        group: GroupId,
        verifier: CitizenId,
        verified: CitizenId,
    },

    #[error("no verification from {verifier} to {verified} in group {group}")]
    VerificationNotFound {
        group: GroupId,
        verifier: CitizenId,
        verified: CitizenId,
    },

    #[error("verification from {verifier} to {verified} is already revoked")]
    AlreadyRevoked {
        verifier: CitizenId,
        verified: CitizenId,
    },

    #[error("citizen {actor} is not allowed to {action}")]
    Unauthorized { actor: CitizenId, action: &'static str },

    #[error("level error: {0}")]
    Level(#[from] LevelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GroupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CitizenNotFound(_) | Self::VerificationNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidGroupId(_)
            | Self::NotMember { .. }
            | Self::NotInGroup(_)
            | Self::InAnotherGroup { .. }
            | Self::GroupFull { .. } => ErrorKind::PreconditionNotMet,
            Self::AlreadyMember { .. } | Self::AlreadyRevoked { .. } => ErrorKind::AlreadyProcessed,
            Self::SelfVerification => ErrorKind::SelfReference,
            Self::DuplicateVerification { .. } => ErrorKind::DuplicateEdge,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::Level(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}
