use arban_types::CitizenId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistributionError {
    #[error("distribution pool is not initialized")]
    PoolNotInitialized,

    #[error("citizen {0} is not registered for distribution")]
    NotRegistered(CitizenId),

    #[error("HTTP request to distribution endpoint failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from distribution endpoint: {0}")]
    InvalidResponse(String),

    #[error("distribution endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("{0}")]
    Other(String),
}
