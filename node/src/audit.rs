//! Audit trail.
//!
//! Every committed change produces one [`AuditEvent`]. Sinks receive events
//! after the transaction commits and cannot fail the operation.

use arban_types::{CitizenId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    CitizenRegistered,
    ConsentAccepted,
    VerificationCreated,
    VerificationRevoked,
    VerifierInvalidated,
    EdgeSuspended,
    LevelChanged,
    UpgradeRequested,
    RequestReviewed,
    EmissionRecorded,
    GroupJoined,
    GroupLeft,
    MutualVerificationSubmitted,
    MutualVerificationRevoked,
}

/// An immutable record of one change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditKind,
    /// Who acted; `None` for automatic changes.
    pub actor: Option<CitizenId>,
    /// What was acted on: a citizen, edge, request, or group id.
    pub target: String,
    pub at: Timestamp,
    pub metadata: BTreeMap<String, String>,
}

impl AuditEvent {
    pub fn new(
        kind: AuditKind,
        actor: Option<&CitizenId>,
        target: impl ToString,
        at: Timestamp,
    ) -> Self {
        Self {
            kind,
            actor: actor.cloned(),
            target: target.to_string(),
            at,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes audit events to the `arban::audit` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::info!(
            target: "arban::audit",
            kind = ?event.kind,
            actor = event.actor.as_ref().map(CitizenId::as_str),
            target_id = %event.target,
            at = event.at.as_secs(),
            metadata = ?event.metadata,
            "audit"
        );
    }
}

/// Keeps events in memory until drained.
#[derive(Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Take every recorded event, leaving the log empty.
    pub fn drain(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn count(&self, kind: AuditKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_the_log() {
        let log = MemoryAuditLog::new();
        let actor = CitizenId::new("root");
        log.record(
            &AuditEvent::new(AuditKind::VerificationCreated, Some(&actor), "edge#1", Timestamp::new(3))
                .with("method", "administrative"),
        );
        assert_eq!(log.count(AuditKind::VerificationCreated), 1);
        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].metadata["method"], "administrative");
        assert!(log.events().is_empty());
    }
}
