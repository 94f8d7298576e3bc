use arban_store::StoreError;
use arban_types::{CitizenId, EmissionLimit, ErrorKind, RequestId, TrustLevel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),

    #[error("{0} not found")]
    RequestNotFound(RequestId),

    #[error("citizen {actor} is not allowed to {action}")]
    Unauthorized { actor: CitizenId, action: &'static str },

    #[error("level {0} cannot be requested")]
    NotRequestable(TrustLevel),

    #[error("citizen {citizen} is at {current}, {requested} needs the level directly below it")]
    WrongCurrentLevel {
        citizen: CitizenId,
        current: TrustLevel,
        requested: TrustLevel,
    },

    #[error("citizen {citizen} already has a pending request for {level}")]
    DuplicatePendingRequest { citizen: CitizenId, level: TrustLevel },

    #[error("{0} has already been reviewed")]
    AlreadyReviewed(RequestId),

    #[error("citizen {0} cannot review their own request")]
    SelfReview(CitizenId),

    #[error("emission of {amount} by {citizen} exceeds the limit of {limit} (used {used})")]
    EmissionExceeded {
        citizen: CitizenId,
        amount: u128,
        used: u128,
        limit: EmissionLimit,
    },

    #[error("emission amount must be positive")]
    ZeroEmission,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LevelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CitizenNotFound(_) | Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotRequestable(_)
            | Self::WrongCurrentLevel { .. }
            | Self::DuplicatePendingRequest { .. }
            | Self::ZeroEmission => ErrorKind::PreconditionNotMet,
            Self::AlreadyReviewed(_) => ErrorKind::AlreadyProcessed,
            Self::SelfReview(_) => ErrorKind::SelfReference,
            Self::EmissionExceeded { .. } => ErrorKind::QuotaExhausted,
            Self::Store(e) => e.kind(),
        }
    }
}
