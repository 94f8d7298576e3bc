//! The trust service: one store, the three engines, and the side effects that
//! follow a committed change.
//!
//! Every mutating call runs the engine against a single write transaction and
//! commits it before anything leaves the process. Audit events, metrics and
//! distribution calls are dispatched only after the commit succeeds, and none of
//! them can fail the operation.

use crate::audit::{AuditEvent, AuditKind, AuditSink, TracingAuditSink};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::metrics::TrustMetrics;
use arban_distribution::{
    DispatchingDistribution, DistributionSink, FireAndForget, HttpDistributionClient,
    NoDistribution,
};
use arban_groups::{GroupChange, GroupEngine, GroupProgress, MemberVerifications, MutualOutcome};
use arban_levels::{
    EmissionReceipt, EmissionStatus, LevelEngine, LevelTransition, ReviewDecision, ReviewOutcome,
    UpgradeRequest,
};
use arban_store::{Citizen, TrustRead, TrustStore, TrustWrite, VerificationRequest};
use arban_store_lmdb::LmdbTrustStore;
use arban_types::{
    CitizenId, Clock, EdgeId, GroupId, RequestId, Role, SystemClock, Timestamp, TrustLevel,
    TrustParams,
};
use arban_verification::{
    CascadeReport, InvalidationOutcome, RevokeOutcome, VerificationChain, VerificationEngine,
    VerifierStats, VerifyCommand, VerifyOutcome,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct TrustService<S: TrustStore> {
    pub(crate) store: Arc<S>,
    pub(crate) params: TrustParams,
    pub(crate) verification: VerificationEngine,
    pub(crate) levels: LevelEngine,
    pub(crate) groups: GroupEngine,
    pub(crate) distribution: FireAndForget,
    pub(crate) dispatcher: Option<Arc<DispatchingDistribution>>,
    pub(crate) audit: Arc<dyn AuditSink>,
    pub(crate) metrics: Arc<TrustMetrics>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<S: TrustStore> TrustService<S> {
    /// A service with no distribution ledger, tracing audit, and wall-clock time.
    pub fn new(store: Arc<S>, params: TrustParams) -> Self {
        Self {
            store,
            verification: VerificationEngine::new(params.clone()),
            levels: LevelEngine::new(params.clone()),
            groups: GroupEngine::new(params.clone()),
            params,
            distribution: FireAndForget::new(Arc::new(NoDistribution)),
            dispatcher: None,
            audit: Arc::new(TracingAuditSink),
            metrics: Arc::new(TrustMetrics::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_distribution(mut self, sink: Arc<dyn DistributionSink>) -> Self {
        self.distribution = FireAndForget::new(sink);
        self.dispatcher = None;
        self
    }

    /// Route distribution through `dispatcher` and keep it for
    /// [`flush_distribution`](Self::flush_distribution).
    pub fn with_dispatcher(mut self, dispatcher: Arc<DispatchingDistribution>) -> Self {
        self.distribution = FireAndForget::new(dispatcher.clone());
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Wait up to `timeout` for remote distribution calls still in flight.
    /// Returns how many were dropped at the deadline.
    pub async fn flush_distribution(&self, timeout: Duration) -> usize {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.flush(timeout).await,
            None => 0,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TrustMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn params(&self) -> &TrustParams {
        &self.params
    }

    pub fn metrics(&self) -> &TrustMetrics {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `op` in a write transaction and commit it if `op` succeeds.
    pub(crate) fn write<T>(
        &self,
        op: impl FnOnce(&mut dyn TrustWrite, Timestamp) -> Result<T, ServiceError>,
    ) -> Result<(T, Timestamp), ServiceError> {
        let now = self.clock.now();
        let mut txn = self.store.write_txn()?;
        let out = op(&mut *txn, now)?;
        txn.commit()?;
        Ok((out, now))
    }

    fn read<T>(
        &self,
        op: impl FnOnce(&dyn TrustRead) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let txn = self.store.read_txn()?;
        op(&*txn)
    }

    pub(crate) fn emit(&self, event: AuditEvent) {
        self.audit.record(&event);
    }

    /// Audit, count and distribute for one committed level change.
    pub(crate) fn dispatch_transition(&self, transition: &LevelTransition) {
        self.metrics.level_transitions.inc();
        self.emit(
            AuditEvent::new(
                AuditKind::LevelChanged,
                transition.by.as_ref(),
                &transition.citizen,
                transition.at,
            )
            .with("from", transition.from)
            .with("to", transition.to)
            .with("source", format!("{:?}", transition.source)),
        );
        if transition.is_upgrade()
            && self
                .distribution
                .level_reached(&transition.citizen, transition.to)
                .is_none()
        {
            self.metrics.distribution_failures.inc();
        }
    }

    fn dispatch_cascade(&self, cascade: &CascadeReport, actor: &CitizenId, at: Timestamp) {
        self.metrics
            .cascade_suspensions
            .inc_by(cascade.suspended.len() as u64);
        for edge in &cascade.suspended {
            self.emit(AuditEvent::new(
                AuditKind::EdgeSuspended,
                Some(actor),
                edge,
                at,
            ));
        }
    }

    // ── Citizens ────────────────────────────────────────────────────────────

    /// Add a citizen at `UNVERIFIED` with the default verification quota.
    pub fn register_citizen(&self, id: CitizenId, role: Role) -> Result<Citizen, ServiceError> {
        if !id.is_valid() {
            return Err(ServiceError::InvalidCitizenId(id));
        }
        let quota = self.params.default_verification_quota;
        let (citizen, now) = self.write(|txn, now| {
            if txn.citizen(&id)?.is_some() {
                return Err(ServiceError::CitizenExists(id));
            }
            let citizen = Citizen::new(id, role, quota, now);
            txn.put_citizen(&citizen)?;
            Ok(citizen)
        })?;
        tracing::info!(citizen = %citizen.id, %role, "citizen registered");
        self.metrics.citizens_registered.inc();
        self.emit(
            AuditEvent::new(AuditKind::CitizenRegistered, None, &citizen.id, now)
                .with("role", role),
        );
        if !self.distribution.register(&citizen.id) {
            self.metrics.distribution_failures.inc();
        }
        Ok(citizen)
    }

    pub fn citizen(&self, id: &CitizenId) -> Result<Citizen, ServiceError> {
        self.read(|txn| {
            txn.citizen(id)?
                .ok_or_else(|| ServiceError::CitizenNotFound(id.clone()))
        })
    }

    pub fn citizens(&self) -> Result<Vec<Citizen>, ServiceError> {
        self.read(|txn| Ok(txn.citizens()?))
    }

    /// Returns `false` when consent was already on record.
    pub fn accept_consent(&self, citizen: &CitizenId) -> Result<bool, ServiceError> {
        let (accepted, now) = self.write(|txn, now| {
            Ok(self.verification.accept_consent(txn, citizen, now)?)
        })?;
        if accepted {
            self.emit(AuditEvent::new(
                AuditKind::ConsentAccepted,
                Some(citizen),
                citizen,
                now,
            ));
        }
        Ok(accepted)
    }

    // ── Verification ────────────────────────────────────────────────────────

    pub fn verify(&self, cmd: VerifyCommand) -> Result<VerifyOutcome, ServiceError> {
        let (outcome, now) =
            self.write(|txn, now| Ok(self.verification.verify(txn, cmd, now)?))?;
        self.metrics.verifications.inc();
        self.emit(
            AuditEvent::new(
                AuditKind::VerificationCreated,
                Some(&outcome.edge.verifier),
                outcome.edge.id,
                now,
            )
            .with("verified", &outcome.edge.verified)
            .with("method", outcome.edge.method)
            .with("chain_depth", outcome.chain_depth),
        );
        Ok(outcome)
    }

    pub fn revoke(
        &self,
        edge: EdgeId,
        revoked_by: &CitizenId,
        reason: &str,
    ) -> Result<RevokeOutcome, ServiceError> {
        let (outcome, now) = self.write(|txn, now| {
            Ok(self.verification.revoke(txn, edge, revoked_by, reason, now)?)
        })?;
        self.metrics.revocations.inc();
        self.emit(
            AuditEvent::new(AuditKind::VerificationRevoked, Some(revoked_by), edge, now)
                .with("reason", reason)
                .with("cascade_count", outcome.cascade_count()),
        );
        self.dispatch_cascade(&outcome.cascade, revoked_by, now);
        Ok(outcome)
    }

    pub fn invalidate_verifier(
        &self,
        citizen: &CitizenId,
        revoked_by: &CitizenId,
        reason: &str,
    ) -> Result<InvalidationOutcome, ServiceError> {
        let (outcome, now) = self.write(|txn, now| {
            Ok(self
                .verification
                .invalidate_verifier(txn, citizen, revoked_by, reason, now)?)
        })?;
        self.metrics.revocations.inc();
        self.emit(
            AuditEvent::new(AuditKind::VerifierInvalidated, Some(revoked_by), citizen, now)
                .with("reason", reason)
                .with("inbound_suspended", outcome.inbound_suspended.len())
                .with("cascade_count", outcome.cascade.count()),
        );
        self.dispatch_cascade(&outcome.cascade, revoked_by, now);
        Ok(outcome)
    }

    pub fn chain(&self, citizen: &CitizenId) -> Result<VerificationChain, ServiceError> {
        self.read(|txn| Ok(self.verification.chain(txn, citizen)?))
    }

    pub fn pending_citizens(&self) -> Result<Vec<Citizen>, ServiceError> {
        self.read(|txn| Ok(self.verification.pending_citizens(txn)?))
    }

    pub fn verifier_stats(&self, citizen: &CitizenId) -> Result<VerifierStats, ServiceError> {
        self.read(|txn| Ok(self.verification.verifier_stats(txn, citizen)?))
    }

    // ── Levels ──────────────────────────────────────────────────────────────

    pub fn level_of(&self, citizen: &CitizenId) -> Result<TrustLevel, ServiceError> {
        self.read(|txn| Ok(self.levels.level_of(txn, citizen)?))
    }

    pub fn request_upgrade(&self, ask: UpgradeRequest) -> Result<VerificationRequest, ServiceError> {
        let (request, now) =
            self.write(|txn, now| Ok(self.levels.request_upgrade(txn, ask, now)?))?;
        self.emit(
            AuditEvent::new(
                AuditKind::UpgradeRequested,
                Some(&request.requester),
                request.id,
                now,
            )
            .with("level", request.requested_level),
        );
        Ok(request)
    }

    pub fn review_request(
        &self,
        id: RequestId,
        reviewer: &CitizenId,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<ReviewOutcome, ServiceError> {
        let (outcome, now) = self.write(|txn, now| {
            Ok(self
                .levels
                .review_request(txn, id, reviewer, decision, notes, now)?)
        })?;
        self.emit(
            AuditEvent::new(AuditKind::RequestReviewed, Some(reviewer), id, now)
                .with("decision", format!("{decision:?}"))
                .with("requester", &outcome.request.requester),
        );
        if let Some(transition) = &outcome.transition {
            self.dispatch_transition(transition);
        }
        Ok(outcome)
    }

    /// Supreme override. Returns `None` when the citizen was already at `level`.
    pub fn set_level(
        &self,
        citizen: &CitizenId,
        level: TrustLevel,
        actor: &CitizenId,
    ) -> Result<Option<LevelTransition>, ServiceError> {
        let (transition, _) = self.write(|txn, now| {
            Ok(self.levels.set_level(txn, citizen, level, actor, now)?)
        })?;
        if let Some(transition) = &transition {
            self.dispatch_transition(transition);
        }
        Ok(transition)
    }

    pub fn pending_requests(&self) -> Result<Vec<VerificationRequest>, ServiceError> {
        self.read(|txn| Ok(self.levels.pending_requests(txn)?))
    }

    pub fn requests_of(&self, citizen: &CitizenId) -> Result<Vec<VerificationRequest>, ServiceError> {
        self.read(|txn| Ok(self.levels.requests_of(txn, citizen)?))
    }

    // ── Emission ────────────────────────────────────────────────────────────

    pub fn can_emit(&self, citizen: &CitizenId, amount: u128) -> Result<bool, ServiceError> {
        self.read(|txn| Ok(self.levels.can_emit(txn, citizen, amount)?))
    }

    /// Check and record in one transaction; two racing emissions cannot both
    /// pass the same headroom.
    pub fn record_emission(
        &self,
        citizen: &CitizenId,
        amount: u128,
    ) -> Result<EmissionReceipt, ServiceError> {
        let (receipt, now) = self.write(|txn, _| {
            Ok(self.levels.record_emission(txn, citizen, amount)?)
        })?;
        self.metrics.emissions.inc();
        self.emit(
            AuditEvent::new(AuditKind::EmissionRecorded, Some(citizen), citizen, now)
                .with("amount", amount)
                .with("total_emitted", receipt.total_emitted),
        );
        Ok(receipt)
    }

    pub fn emission_status(&self, citizen: &CitizenId) -> Result<EmissionStatus, ServiceError> {
        self.read(|txn| Ok(self.levels.emission_status(txn, citizen)?))
    }

    // ── Groups ──────────────────────────────────────────────────────────────

    fn dispatch_transitions(&self, transitions: &[LevelTransition]) {
        for transition in transitions {
            self.dispatch_transition(transition);
        }
    }

    pub fn assign_member(
        &self,
        citizen: &CitizenId,
        group: &GroupId,
    ) -> Result<GroupChange, ServiceError> {
        let (change, now) = self.write(|txn, now| {
            Ok(self.groups.assign_member(txn, citizen, group, now)?)
        })?;
        self.emit(
            AuditEvent::new(AuditKind::GroupJoined, Some(citizen), group, now)
                .with("members", change.progress.member_count),
        );
        self.dispatch_transitions(&change.transitions);
        Ok(change)
    }

    pub fn remove_member(&self, citizen: &CitizenId) -> Result<GroupChange, ServiceError> {
        let (change, now) =
            self.write(|txn, now| Ok(self.groups.remove_member(txn, citizen, now)?))?;
        self.emit(AuditEvent::new(
            AuditKind::GroupLeft,
            Some(citizen),
            &change.group,
            now,
        ));
        self.dispatch_transitions(&change.transitions);
        Ok(change)
    }

    pub fn submit_mutual_verification(
        &self,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
        notes: Option<String>,
    ) -> Result<MutualOutcome, ServiceError> {
        let (outcome, now) = self.write(|txn, now| {
            Ok(self
                .groups
                .submit_mutual_verification(txn, group, verifier, verified, notes, now)?)
        })?;
        self.emit(
            AuditEvent::new(
                AuditKind::MutualVerificationSubmitted,
                Some(verifier),
                group,
                now,
            )
            .with("verified", verified)
            .with("completed", outcome.progress.completed)
            .with("total", outcome.progress.total),
        );
        self.dispatch_transitions(&outcome.transitions);
        Ok(outcome)
    }

    pub fn revoke_mutual_verification(
        &self,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
        requested_by: &CitizenId,
    ) -> Result<MutualOutcome, ServiceError> {
        let (outcome, now) = self.write(|txn, now| {
            Ok(self.groups.revoke_mutual_verification(
                txn,
                group,
                verifier,
                verified,
                requested_by,
                now,
            )?)
        })?;
        self.emit(
            AuditEvent::new(
                AuditKind::MutualVerificationRevoked,
                Some(requested_by),
                group,
                now,
            )
            .with("verifier", verifier)
            .with("verified", verified),
        );
        self.dispatch_transitions(&outcome.transitions);
        Ok(outcome)
    }

    pub fn group_progress(&self, group: &GroupId) -> Result<GroupProgress, ServiceError> {
        self.read(|txn| Ok(self.groups.progress(txn, group)?))
    }

    pub fn verification_matrix(
        &self,
        group: &GroupId,
    ) -> Result<BTreeMap<CitizenId, Vec<CitizenId>>, ServiceError> {
        self.read(|txn| Ok(self.groups.verification_matrix(txn, group)?))
    }

    /// Members `citizen` has not yet verified.
    pub fn unverified_members(
        &self,
        group: &GroupId,
        citizen: &CitizenId,
    ) -> Result<Vec<CitizenId>, ServiceError> {
        self.read(|txn| Ok(self.groups.unverified_members(txn, group, citizen)?))
    }

    pub fn member_verifications(
        &self,
        group: &GroupId,
        citizen: &CitizenId,
    ) -> Result<MemberVerifications, ServiceError> {
        self.read(|txn| Ok(self.groups.member_verifications(txn, group, citizen)?))
    }
}

impl TrustService<LmdbTrustStore> {
    /// Open the LMDB store under `config.data_dir` and wire the configured
    /// distribution endpoint. Must be called inside a tokio runtime when an
    /// endpoint is set.
    pub fn open(config: &ServiceConfig) -> Result<Self, ServiceError> {
        config
            .params
            .validate()
            .map_err(ServiceError::Config)?;
        let store = LmdbTrustStore::open(&config.data_dir, config.map_size)?;
        let mut service = Self::new(Arc::new(store), config.params.clone());
        if let Some(endpoint) = &config.distribution_endpoint {
            let client = HttpDistributionClient::new(endpoint.clone());
            let sink = DispatchingDistribution::from_current(client)
                .map_err(|e| ServiceError::Config(e.to_string()))?;
            service = service.with_dispatcher(Arc::new(sink));
            tracing::info!(%endpoint, "distribution endpoint configured");
        }
        tracing::info!(data_dir = %config.data_dir.display(), "trust store opened");
        Ok(service)
    }
}
