//! Verification Engine: create and revoke edges, invalidate verifiers.

use crate::cascade::{run_cascade, CascadeReport};
use crate::chain::{walk_chain, VerificationChain};
use crate::error::VerificationError;
use arban_store::{Citizen, TrustRead, TrustWrite, VerificationEdge};
use arban_types::{CitizenId, EdgeId, Role, Timestamp, TrustParams, VerificationMethod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request to vouch for a citizen.
#[derive(Clone, Debug)]
pub struct VerifyCommand {
    pub verifier: CitizenId,
    pub verified: CitizenId,
    /// Defaults by the verifier's role when `None`.
    pub method: Option<VerificationMethod>,
    pub metadata: BTreeMap<String, String>,
}

impl VerifyCommand {
    pub fn new(verifier: impl Into<CitizenId>, verified: impl Into<CitizenId>) -> Self {
        Self {
            verifier: verifier.into(),
            verified: verified.into(),
            method: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: VerificationMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub edge: VerificationEdge,
    /// Hops from the target to the nearest trust root.
    pub chain_depth: usize,
    /// Verifier's verifications left; `None` when unlimited.
    pub remaining_quota: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeOutcome {
    pub edge: VerificationEdge,
    /// The verified citizen lost their last active inbound edge.
    pub target_unverified: bool,
    pub cascade: CascadeReport,
}

impl RevokeOutcome {
    pub fn cascade_count(&self) -> usize {
        self.cascade.count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationOutcome {
    pub citizen: CitizenId,
    /// Inbound edges suspended to strip the citizen's standing.
    pub inbound_suspended: Vec<EdgeId>,
    pub cascade: CascadeReport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierStats {
    pub citizen: CitizenId,
    pub role: Role,
    pub is_verified: bool,
    pub verifications_given: u32,
    pub verification_quota: u32,
    /// `None` when the role has no quota.
    pub remaining: Option<u32>,
    /// Outbound edges, newest first.
    pub edges: Vec<VerificationEdge>,
}

pub struct VerificationEngine {
    params: TrustParams,
}

impl VerificationEngine {
    pub fn new(params: TrustParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrustParams {
        &self.params
    }

    /// Record the consent step `verify` requires of its target. Returns `false`
    /// when consent was already on record.
    pub fn accept_consent<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        now: Timestamp,
    ) -> Result<bool, VerificationError> {
        let mut record = load_citizen(&*txn, citizen)?;
        if record.has_consented() {
            return Ok(false);
        }
        record.consent_accepted_at = Some(now);
        txn.put_citizen(&record)?;
        tracing::debug!(citizen = %citizen, "consent accepted");
        Ok(true)
    }

    /// Create an edge from `cmd.verifier` to `cmd.verified`.
    pub fn verify<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        cmd: VerifyCommand,
        now: Timestamp,
    ) -> Result<VerifyOutcome, VerificationError> {
        if cmd.verifier == cmd.verified {
            return Err(VerificationError::SelfVerification);
        }
        let mut verifier = load_citizen(&*txn, &cmd.verifier)?;
        let mut target = load_citizen(&*txn, &cmd.verified)?;

        if !verifier.role.can_verify_without_standing() && !verifier.is_verified {
            return Err(VerificationError::VerifierNotVerified(verifier.id));
        }
        let method = cmd
            .method
            .unwrap_or_else(|| VerificationMethod::default_for(verifier.role));
        if method == VerificationMethod::Administrative
            && !verifier.role.can_verify_administratively()
        {
            return Err(VerificationError::Unauthorized {
                actor: verifier.id,
                action: "verify administratively",
            });
        }
        if !verifier.has_quota_left() {
            return Err(VerificationError::QuotaExhausted {
                verifier: verifier.id,
                quota: verifier.verification_quota,
            });
        }
        if target.is_verified {
            return Err(VerificationError::AlreadyVerified(target.id));
        }
        if !target.has_consented() {
            return Err(VerificationError::ConsentRequired(target.id));
        }
        // Revoked pairs stay taken: a fresh verification needs a different verifier.
        if txn.edge_between(&verifier.id, &target.id)?.is_some() {
            return Err(VerificationError::DuplicateEdge {
                verifier: verifier.id,
                verified: target.id,
            });
        }

        let id = txn.next_edge_id()?;
        let edge = VerificationEdge::new(
            id,
            verifier.id.clone(),
            target.id.clone(),
            method,
            cmd.metadata,
            now,
        );
        txn.insert_edge(&edge)?;

        target.is_verified = true;
        target.verified_at = Some(now);
        txn.put_citizen(&target)?;

        verifier.verifications_given = verifier.verifications_given.saturating_add(1);
        txn.put_citizen(&verifier)?;

        let chain = walk_chain(&*txn, &target.id, self.params.chain_depth_limit)?;
        tracing::info!(
            edge = %edge.id,
            verifier = %verifier.id,
            verified = %target.id,
            method = method.as_str(),
            chain_depth = chain.depth(),
            "verification created"
        );

        Ok(VerifyOutcome {
            edge,
            chain_depth: chain.depth(),
            remaining_quota: verifier.remaining_quota(),
        })
    }

    /// Revoke one edge. If the verified citizen is left without an active
    /// inbound edge they lose their standing and the cascade runs from them.
    pub fn revoke<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        edge_id: EdgeId,
        revoked_by: &CitizenId,
        reason: &str,
        now: Timestamp,
    ) -> Result<RevokeOutcome, VerificationError> {
        let actor = load_citizen(&*txn, revoked_by)?;
        if !actor.role.can_revoke() {
            return Err(VerificationError::Unauthorized {
                actor: actor.id,
                action: "revoke verifications",
            });
        }
        let mut edge = txn
            .edge(edge_id)?
            .ok_or(VerificationError::EdgeNotFound(edge_id))?;
        if edge.verified == actor.id {
            return Err(VerificationError::SelfRevocation(actor.id));
        }
        if !edge.suspend(reason, Some(actor.id.clone()), now) {
            return Err(VerificationError::EdgeInactive(edge_id));
        }
        txn.update_edge(&edge)?;

        if let Some(mut verifier) = txn.citizen(&edge.verifier)? {
            verifier.verifications_given = verifier.verifications_given.saturating_sub(1);
            txn.put_citizen(&verifier)?;
        }

        let mut target = load_citizen(&*txn, &edge.verified)?;
        let target_unverified = target.is_verified
            && !target.role.is_trust_root()
            && txn.active_edges_to(&target.id)?.is_empty();

        let cascade = if target_unverified {
            target.is_verified = false;
            target.verified_at = None;
            txn.put_citizen(&target)?;
            run_cascade(
                txn,
                &target.id,
                reason,
                Some(&actor.id),
                self.params.cascade_depth_limit,
                now,
            )?
        } else {
            CascadeReport::default()
        };

        tracing::info!(
            edge = %edge.id,
            revoked_by = %actor.id,
            target_unverified,
            cascade = cascade.count(),
            "verification revoked"
        );
        Ok(RevokeOutcome {
            edge,
            target_unverified,
            cascade,
        })
    }

    /// Strip a verifier's standing directly: suspend their active inbound
    /// edges, clear their verified flag, and cascade through their grants.
    pub fn invalidate_verifier<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        revoked_by: &CitizenId,
        reason: &str,
        now: Timestamp,
    ) -> Result<InvalidationOutcome, VerificationError> {
        let actor = load_citizen(&*txn, revoked_by)?;
        if !actor.role.can_revoke() {
            return Err(VerificationError::Unauthorized {
                actor: actor.id,
                action: "invalidate verifiers",
            });
        }
        if actor.id == *citizen {
            return Err(VerificationError::SelfRevocation(actor.id));
        }
        let mut subject = load_citizen(&*txn, citizen)?;
        if subject.role.is_trust_root() {
            return Err(VerificationError::TrustRoot(subject.id));
        }

        let inbound = txn.active_edges_to(citizen)?;
        if !subject.is_verified && inbound.is_empty() && txn.active_edges_from(citizen)?.is_empty()
        {
            return Err(VerificationError::NothingToInvalidate(subject.id));
        }

        let mut inbound_suspended = Vec::with_capacity(inbound.len());
        for mut edge in inbound {
            if !edge.suspend(reason, Some(actor.id.clone()), now) {
                continue;
            }
            txn.update_edge(&edge)?;
            if let Some(mut verifier) = txn.citizen(&edge.verifier)? {
                verifier.verifications_given = verifier.verifications_given.saturating_sub(1);
                txn.put_citizen(&verifier)?;
            }
            inbound_suspended.push(edge.id);
        }

        subject.is_verified = false;
        subject.verified_at = None;
        txn.put_citizen(&subject)?;

        let cascade = run_cascade(
            txn,
            &subject.id,
            reason,
            Some(&actor.id),
            self.params.cascade_depth_limit,
            now,
        )?;
        tracing::info!(
            citizen = %subject.id,
            revoked_by = %actor.id,
            inbound = inbound_suspended.len(),
            cascade = cascade.count(),
            "verifier invalidated"
        );
        Ok(InvalidationOutcome {
            citizen: subject.id,
            inbound_suspended,
            cascade,
        })
    }

    /// The chain of verifiers from `citizen` up to a trust root.
    pub fn chain<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
    ) -> Result<VerificationChain, VerificationError> {
        load_citizen(txn, citizen)?;
        Ok(walk_chain(txn, citizen, self.params.chain_depth_limit)?)
    }

    /// Citizens who have consented but hold no active verification, oldest
    /// consent first.
    pub fn pending_citizens<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
    ) -> Result<Vec<Citizen>, VerificationError> {
        let mut pending: Vec<Citizen> = txn
            .citizens()?
            .into_iter()
            .filter(|c| c.has_consented() && !c.is_verified)
            .collect();
        pending.sort_by(|a, b| {
            a.consent_accepted_at
                .cmp(&b.consent_accepted_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pending)
    }

    pub fn verifier_stats<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
    ) -> Result<VerifierStats, VerificationError> {
        let record = load_citizen(txn, citizen)?;
        let mut edges = txn.edges_from(citizen)?;
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(VerifierStats {
            remaining: record.remaining_quota(),
            citizen: record.id,
            role: record.role,
            is_verified: record.is_verified,
            verifications_given: record.verifications_given,
            verification_quota: record.verification_quota,
            edges,
        })
    }
}

fn load_citizen<T: TrustRead + ?Sized>(
    txn: &T,
    id: &CitizenId,
) -> Result<Citizen, VerificationError> {
    txn.citizen(id)?
        .ok_or_else(|| VerificationError::CitizenNotFound(id.clone()))
}
