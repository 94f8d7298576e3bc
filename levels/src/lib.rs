//! Level Engine.
//!
//! Each citizen sits at one trust level:
//! `UNVERIFIED → GROUP_VERIFIED → CLAN_VERIFIED → FULLY_VERIFIED`.
//!
//! - The first step comes only from group completeness (see `arban-groups`).
//! - The next two need an upgrade request approved by an elevated reviewer.
//! - A supreme-role actor may set any level directly.
//!
//! The level gates how much currency a citizen may create. At `GROUP_VERIFIED`
//! the allowance is pooled across the whole group.

pub mod engine;
pub mod error;
pub mod quota;
pub mod requests;
pub mod transition;

pub use engine::LevelEngine;
pub use error::LevelError;
pub use quota::{EmissionReceipt, EmissionStatus};
pub use requests::{ReviewDecision, ReviewOutcome, UpgradeRequest};
pub use transition::LevelTransition;
