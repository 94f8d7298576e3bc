use arban_types::{CitizenId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("verification error: {0}")]
    Verification(#[from] arban_verification::VerificationError),

    #[error("level error: {0}")]
    Level(#[from] arban_levels::LevelError),

    #[error("group error: {0}")]
    Group(#[from] arban_groups::GroupError),

    #[error("store error: {0}")]
    Store(#[from] arban_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] arban_store_lmdb::LmdbError),

    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),

    #[error("citizen {0} is already registered")]
    CitizenExists(CitizenId),

    #[error("invalid citizen id {0:?}")]
    InvalidCitizenId(CitizenId),

    #[error("config error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Verification(e) => e.kind(),
            Self::Level(e) => e.kind(),
            Self::Group(e) => e.kind(),
            Self::Store(e) => e.kind(),
            Self::Lmdb(_) => ErrorKind::Storage,
            Self::CitizenNotFound(_) => ErrorKind::NotFound,
            Self::CitizenExists(_) => ErrorKind::AlreadyProcessed,
            Self::InvalidCitizenId(_) | Self::Config(_) => ErrorKind::PreconditionNotMet,
        }
    }
}
