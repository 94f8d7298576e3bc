//! Group Completeness Engine.
//!
//! A trust group (an Arban) has a fixed number of members (five by default).
//! It is complete once every member has verified every other member. Completion
//! lifts each `UNVERIFIED` member to `GROUP_VERIFIED`; losing completion (a
//! mutual verification revoked, a member leaving) reverses it for members whose
//! level came from the group.

pub mod engine;
pub mod error;
pub mod progress;

pub use engine::{GroupChange, GroupEngine, MemberVerifications, MutualOutcome};
pub use error::GroupError;
pub use progress::GroupProgress;
