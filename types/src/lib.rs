//! Fundamental types for the Arban trust graph.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, timestamps, roles, trust levels, emission limits, tunable parameters,
//! and the error kinds every engine reports.

pub mod emission;
pub mod error;
pub mod ids;
pub mod params;
pub mod role;
pub mod state;
pub mod time;

pub use emission::EmissionLimit;
pub use error::{ErrorKind, ParseError};
pub use ids::{CitizenId, EdgeId, GroupId, RequestId};
pub use params::TrustParams;
pub use role::Role;
pub use state::{LevelSource, RequestStatus, TrustLevel, VerificationMethod};
pub use time::{Clock, SystemClock, Timestamp};
