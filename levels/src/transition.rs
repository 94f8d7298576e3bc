use arban_types::{CitizenId, LevelSource, Timestamp, TrustLevel};
use serde::{Deserialize, Serialize};

/// A committed level change, handed to audit and distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTransition {
    pub citizen: CitizenId,
    pub from: TrustLevel,
    pub to: TrustLevel,
    pub source: LevelSource,
    /// Actor responsible; `None` for automatic transitions.
    pub by: Option<CitizenId>,
    pub at: Timestamp,
}

impl LevelTransition {
    pub fn is_upgrade(&self) -> bool {
        self.to > self.from
    }
}
