//! Prometheus metrics for the trust service.
//!
//! [`TrustMetrics`] owns a dedicated [`Registry`]; [`TrustMetrics::render`]
//! encodes it in the Prometheus text exposition format.

use prometheus::{register_int_counter_with_registry, Encoder, IntCounter, Opts, Registry, TextEncoder};

/// Counters for every kind of trust-graph change.
pub struct TrustMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    pub citizens_registered: IntCounter,
    /// Verification edges created.
    pub verifications: IntCounter,
    /// Explicit edge revocations and verifier invalidations.
    pub revocations: IntCounter,
    /// Edges suspended by cascades.
    pub cascade_suspensions: IntCounter,
    pub level_transitions: IntCounter,
    /// Successful `record_emission` calls.
    pub emissions: IntCounter,
    /// Distribution calls that failed and were swallowed.
    pub distribution_failures: IntCounter,
}

impl TrustMetrics {
    /// Create a fresh set of metrics, all registered under a new [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let citizens_registered = register_int_counter_with_registry!(
            Opts::new("arban_citizens_registered_total", "Citizens registered"),
            registry
        )
        .expect("failed to register citizens_registered counter");

        let verifications = register_int_counter_with_registry!(
            Opts::new("arban_verifications_total", "Verification edges created"),
            registry
        )
        .expect("failed to register verifications counter");

        let revocations = register_int_counter_with_registry!(
            Opts::new(
                "arban_revocations_total",
                "Verification revocations and verifier invalidations"
            ),
            registry
        )
        .expect("failed to register revocations counter");

        let cascade_suspensions = register_int_counter_with_registry!(
            Opts::new(
                "arban_cascade_suspensions_total",
                "Edges suspended by cascade revocation"
            ),
            registry
        )
        .expect("failed to register cascade_suspensions counter");

        let level_transitions = register_int_counter_with_registry!(
            Opts::new("arban_level_transitions_total", "Trust level changes"),
            registry
        )
        .expect("failed to register level_transitions counter");

        let emissions = register_int_counter_with_registry!(
            Opts::new("arban_emissions_total", "Emissions recorded"),
            registry
        )
        .expect("failed to register emissions counter");

        let distribution_failures = register_int_counter_with_registry!(
            Opts::new(
                "arban_distribution_failures_total",
                "Distribution calls that failed and were discarded"
            ),
            registry
        )
        .expect("failed to register distribution_failures counter");

        Self {
            registry,
            citizens_registered,
            verifications,
            revocations,
            cascade_suspensions,
            level_transitions,
            emissions,
            distribution_failures,
        }
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for TrustMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_lists_counters() {
        let metrics = TrustMetrics::new();
        metrics.verifications.inc();
        metrics.cascade_suspensions.inc_by(3);
        let text = metrics.render().unwrap();
        assert!(text.contains("arban_verifications_total 1"));
        assert!(text.contains("arban_cascade_suspensions_total 3"));
    }
}
