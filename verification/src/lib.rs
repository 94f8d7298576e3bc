//! Verification Engine.
//!
//! Citizens vouch for each other by creating directed verification edges. An
//! edge is never deleted: revocation marks it inactive and records why. When a
//! citizen loses their last active inbound edge they lose their standing, and
//! every edge they granted is suspended in turn (cascade revocation).
//!
//! All operations run against a caller-supplied store transaction, so a failed
//! operation (or a cascade interrupted halfway) leaves nothing behind.

pub mod cascade;
pub mod chain;
pub mod engine;
pub mod error;

pub use cascade::{run_cascade, CascadeReport};
pub use chain::{walk_chain, ChainLink, VerificationChain};
pub use engine::{
    InvalidationOutcome, RevokeOutcome, VerificationEngine, VerifierStats, VerifyCommand,
    VerifyOutcome,
};
pub use error::VerificationError;
