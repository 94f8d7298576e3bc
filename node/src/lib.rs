//! Arban trust service.
//!
//! Wires the verification, level and group engines to a trust store and owns
//! everything around them:
//! - Configuration (`ServiceConfig`, TOML)
//! - Structured logging
//! - Audit events and Prometheus metrics for every committed change
//! - Fire-and-forget distribution calls on level upgrades
//! - Startup reconciliation of trust roots

pub mod audit;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod service;

pub use audit::{AuditEvent, AuditKind, AuditSink, MemoryAuditLog, TracingAuditSink};
pub use bootstrap::BootstrapReport;
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use logging::{init_logging, LogFormat};
pub use metrics::TrustMetrics;
pub use service::TrustService;
pub use arban_store_lmdb::LmdbTrustStore;
