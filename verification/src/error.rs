use arban_store::StoreError;
use arban_types::{CitizenId, EdgeId, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("citizen {0} not found")]
    CitizenNotFound(CitizenId),

    #[error("{0} not found")]
    EdgeNotFound(EdgeId),

    #[error("citizen {0} is already verified")]
    AlreadyVerified(CitizenId),

    #[error("self-verification is not allowed")]
    SelfVerification,

    #[error("citizen {0} cannot revoke their own verification")]
    SelfRevocation(CitizenId),

    #[error("verifier {verifier} has used all {quota} verifications")]
    QuotaExhausted { verifier: CitizenId, quota: u32 },

    #[error("citizen {0} has not accepted consent")]
    ConsentRequired(CitizenId),

    #[error("verifier {0} is not verified")]
    VerifierNotVerified(CitizenId),

    #[error("citizen {0} is a trust root and cannot be invalidated")]
    TrustRoot(CitizenId),

    #[error("citizen {actor} is not allowed to {action}")]
    Unauthorized { actor: CitizenId, action: &'static str },

    #[error("an edge from {verifier} to {verified} already exists")]
    DuplicateEdge {
        verifier: CitizenId,
        verified: CitizenId,
    },

    #[error("{0} is already inactive")]
    EdgeInactive(EdgeId),

    #[error("citizen {0} has no standing to invalidate")]
    NothingToInvalidate(CitizenId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl VerificationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CitizenNotFound(_) | Self::EdgeNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyVerified(_) => ErrorKind::AlreadyVerified,
            Self::SelfVerification | Self::SelfRevocation(_) => ErrorKind::SelfReference,
            Self::QuotaExhausted { .. } => ErrorKind::QuotaExhausted,
            Self::ConsentRequired(_) | Self::VerifierNotVerified(_) | Self::TrustRoot(_) => {
                ErrorKind::PreconditionNotMet
            }
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::DuplicateEdge { .. } => ErrorKind::DuplicateEdge,
            Self::EdgeInactive(_) | Self::NothingToInvalidate(_) => ErrorKind::AlreadyProcessed,
            Self::Store(e) => e.kind(),
        }
    }
}
