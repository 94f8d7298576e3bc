//! Membership and mutual verification inside trust groups.

use crate::error::GroupError;
use crate::progress::GroupProgress;
use arban_levels::{LevelEngine, LevelTransition};
use arban_store::{Citizen, GroupMutualVerification, TrustRead, TrustWrite};
use arban_types::{CitizenId, GroupId, Timestamp, TrustParams};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Effect of a membership change on the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupChange {
    pub group: GroupId,
    pub progress: GroupProgress,
    pub transitions: Vec<LevelTransition>,
}

/// Effect of submitting or revoking a mutual verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualOutcome {
    pub verification: GroupMutualVerification,
    pub progress: GroupProgress,
    pub transitions: Vec<LevelTransition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberVerifications {
    pub citizen: CitizenId,
    pub given: Vec<GroupMutualVerification>,
    pub received: Vec<GroupMutualVerification>,
    /// Verifications each member gives (and receives) in a complete group.
    pub expected: usize,
}

pub struct GroupEngine {
    params: TrustParams,
    levels: LevelEngine,
}

impl GroupEngine {
    pub fn new(params: TrustParams) -> Self {
        Self {
            levels: LevelEngine::new(params.clone()),
            params,
        }
    }

    pub fn assign_member<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        group: &GroupId,
        now: Timestamp,
    ) -> Result<GroupChange, GroupError> {
        if !group.is_valid() {
            return Err(GroupError::InvalidGroupId(group.clone()));
        }
        let mut record = load_citizen(&*txn, citizen)?;
        match &record.current_group {
            Some(current) if current == group => {
                return Err(GroupError::AlreadyMember {
                    citizen: record.id,
                    group: group.clone(),
                })
            }
            Some(other) => {
                return Err(GroupError::InAnotherGroup {
                    citizen: record.id,
                    group: other.clone(),
                })
            }
            None => {}
        }
        let size = txn.group_members(group)?.len();
        if size >= self.params.group_size {
            return Err(GroupError::GroupFull {
                group: group.clone(),
                size,
            });
        }

        record.current_group = Some(group.clone());
        txn.put_citizen(&record)?;
        tracing::info!(citizen = %record.id, group = %group, members = size + 1, "member assigned");

        let (progress, transitions) = self.settle(txn, group, now)?;
        Ok(GroupChange {
            group: group.clone(),
            progress,
            transitions,
        })
    }

    /// Take `citizen` out of their group. Their recorded verifications stay but
    /// no longer count.
    pub fn remove_member<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        now: Timestamp,
    ) -> Result<GroupChange, GroupError> {
        let mut record = load_citizen(&*txn, citizen)?;
        let Some(group) = record.current_group.take() else {
            return Err(GroupError::NotInGroup(record.id));
        };
        txn.put_citizen(&record)?;
        tracing::info!(citizen = %record.id, group = %group, "member removed");

        let (progress, mut transitions) = self.settle(txn, &group, now)?;
        if !progress.is_complete {
            if let Some(t) = self.levels.demote_from_group(txn, &record.id, now)? {
                transitions.push(t);
            }
        }
        Ok(GroupChange {
            group,
            progress,
            transitions,
        })
    }

    pub fn submit_mutual_verification<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
        notes: Option<String>,
        now: Timestamp,
    ) -> Result<MutualOutcome, GroupError> {
        if verifier == verified {
            return Err(GroupError::SelfVerification);
        }
        require_member(&*txn, verifier, group)?;
        require_member(&*txn, verified, group)?;

        let verification = match txn.group_verification(group, verifier, verified)? {
            Some(existing) if existing.is_active() => {
                return Err(GroupError::DuplicateVerification {
                    group: group.clone(),
                    verifier: verifier.clone(),
                    verified: verified.clone(),
                })
            }
            Some(mut revoked) => {
                revoked.reactivate(notes, now);
                txn.update_group_verification(&revoked)?;
                revoked
            }
            None => {
                let fresh = GroupMutualVerification::new(
                    group.clone(),
                    verifier.clone(),
                    verified.clone(),
                    notes,
                    now,
                );
                txn.insert_group_verification(&fresh)?;
                fresh
            }
        };
        tracing::debug!(group = %group, verifier = %verifier, verified = %verified, "mutual verification recorded");

        let (progress, transitions) = self.settle(txn, group, now)?;
        Ok(MutualOutcome {
            verification,
            progress,
            transitions,
        })
    }

    /// Revoke a mutual verification. The original verifier or an elevated
    /// citizen may do this.
    pub fn revoke_mutual_verification<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        group: &GroupId,
        verifier: &CitizenId,
        verified: &CitizenId,
        requested_by: &CitizenId,
        now: Timestamp,
    ) -> Result<MutualOutcome, GroupError> {
        let actor = load_citizen(&*txn, requested_by)?;
        if actor.id != *verifier && !actor.role.is_elevated() {
            return Err(GroupError::Unauthorized {
                actor: actor.id,
                action: "revoke another member's verification",
            });
        }
        let mut verification = txn
            .group_verification(group, verifier, verified)?
            .ok_or_else(|| GroupError::VerificationNotFound {
                group: group.clone(),
                verifier: verifier.clone(),
                verified: verified.clone(),
            })?;
        if !verification.revoke(now) {
            return Err(GroupError::AlreadyRevoked {
                verifier: verifier.clone(),
                verified: verified.clone(),
            });
        }
        txn.update_group_verification(&verification)?;
        tracing::info!(group = %group, verifier = %verifier, verified = %verified, by = %actor.id, "mutual verification revoked");

        let (progress, transitions) = self.settle(txn, group, now)?;
        Ok(MutualOutcome {
            verification,
            progress,
            transitions,
        })
    }

    pub fn progress<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        group: &GroupId,
    ) -> Result<GroupProgress, GroupError> {
        let members = txn.group_members(group)?;
        let verifications = txn.group_verifications(group)?;
        Ok(GroupProgress::compute(
            group,
            &members,
            &verifications,
            self.params.group_size,
        ))
    }

    pub fn is_complete<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        group: &GroupId,
    ) -> Result<bool, GroupError> {
        Ok(self.progress(txn, group)?.is_complete)
    }

    /// For each member, the members who have verified them.
    pub fn verification_matrix<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        group: &GroupId,
    ) -> Result<BTreeMap<CitizenId, Vec<CitizenId>>, GroupError> {
        let members = txn.group_members(group)?;
        let mut matrix: BTreeMap<CitizenId, Vec<CitizenId>> =
            members.iter().map(|m| (m.id.clone(), Vec::new())).collect();
        for v in txn.group_verifications(group)? {
            if !v.is_active() || !matrix.contains_key(&v.verifier) {
                continue;
            }
            if let Some(verifiers) = matrix.get_mut(&v.verified) {
                verifiers.push(v.verifier);
            }
        }
        Ok(matrix)
    }

    /// Members `citizen` still has to verify.
    pub fn unverified_members<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        group: &GroupId,
        citizen: &CitizenId,
    ) -> Result<Vec<CitizenId>, GroupError> {
        require_member(txn, citizen, group)?;
        let mut pending = Vec::new();
        for member in txn.group_members(group)? {
            if member.id == *citizen {
                continue;
            }
            let done = txn
                .group_verification(group, citizen, &member.id)?
                .is_some_and(|v| v.is_active());
            if !done {
                pending.push(member.id);
            }
        }
        Ok(pending)
    }

    pub fn member_verifications<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        group: &GroupId,
        citizen: &CitizenId,
    ) -> Result<MemberVerifications, GroupError> {
        require_member(txn, citizen, group)?;
        let (given, received): (Vec<_>, Vec<_>) = txn
            .group_verifications(group)?
            .into_iter()
            .filter(|v| v.is_active() && (v.verifier == *citizen || v.verified == *citizen))
            .partition(|v| v.verifier == *citizen);
        Ok(MemberVerifications {
            citizen: citizen.clone(),
            given,
            received,
            expected: self.params.group_size.saturating_sub(1),
        })
    }

    /// Bring member levels in line with the group's completeness.
    fn settle<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        group: &GroupId,
        now: Timestamp,
    ) -> Result<(GroupProgress, Vec<LevelTransition>), GroupError> {
        let progress = self.progress(&*txn, group)?;
        let mut transitions = Vec::new();
        for member in txn.group_members(group)? {
            let change = if progress.is_complete {
                self.levels.promote_to_group(txn, &member.id, now)?
            } else {
                self.levels.demote_from_group(txn, &member.id, now)?
            };
            transitions.extend(change);
        }
        if !transitions.is_empty() {
            tracing::info!(
                group = %group,
                complete = progress.is_complete,
                changed = transitions.len(),
                "group levels settled"
            );
        }
        Ok((progress, transitions))
    }
}

fn load_citizen<T: TrustRead + ?Sized>(txn: &T, id: &CitizenId) -> Result<Citizen, GroupError> {
    txn.citizen(id)?
        .ok_or_else(|| GroupError::CitizenNotFound(id.clone()))
}

fn require_member<T: TrustRead + ?Sized>(
    txn: &T,
    citizen: &CitizenId,
    group: &GroupId,
) -> Result<Citizen, GroupError> {
    let record = load_citizen(txn, citizen)?;
    if !record.is_member_of(group) {
        return Err(GroupError::NotMember {
            citizen: record.id,
            group: group.clone(),
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_nullables::NullTrustStore;
    use arban_store::TrustStore;
    use arban_types::{ErrorKind, LevelSource, Role, TrustLevel};

    const NOW: Timestamp = Timestamp::EPOCH;

    fn engine() -> GroupEngine {
        GroupEngine::new(TrustParams::default())
    }

    fn g() -> GroupId {
        GroupId::new("arban-1")
    }

    /// Five members in one group plus an outsider and a reviewer.
    fn setup() -> NullTrustStore {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        for id in ["m0", "m1", "m2", "m3", "m4", "out"] {
            txn.put_citizen(&Citizen::new(id.into(), Role::Ordinary, 5, NOW))
                .unwrap();
        }
        txn.put_citizen(&Citizen::new("rev".into(), Role::Reviewer, 5, NOW))
            .unwrap();
        for id in members() {
            engine().assign_member(&mut *txn, &id, &g(), NOW).unwrap();
        }
        txn.commit().unwrap();
        store
    }

    fn members() -> Vec<CitizenId> {
        (0..5).map(|i| CitizenId::new(format!("m{i}"))).collect()
    }

    fn complete<W: TrustWrite + ?Sized>(txn: &mut W) -> Vec<LevelTransition> {
        let mut transitions = Vec::new();
        for a in members() {
            for b in members() {
                if a != b {
                    let out = engine()
                        .submit_mutual_verification(txn, &g(), &a, &b, None, NOW)
                        .unwrap();
                    transitions.extend(out.transitions);
                }
            }
        }
        transitions
    }

    #[test]
    fn completion_promotes_every_member_once() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        let transitions = complete(&mut *txn);
        assert_eq!(transitions.len(), 5);
        assert!(transitions.iter().all(|t| t.to == TrustLevel::GroupVerified));
        assert!(engine().is_complete(&*txn, &g()).unwrap());

        let err = engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), None, NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateEdge);
    }

    #[test]
    fn members_above_unverified_are_skipped() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        let mut clan = txn.citizen(&"m2".into()).unwrap().unwrap();
        clan.trust_level = TrustLevel::ClanVerified;
        clan.level_source = LevelSource::Review;
        txn.put_citizen(&clan).unwrap();

        let transitions = complete(&mut *txn);
        assert_eq!(transitions.len(), 4);
        assert_eq!(
            txn.citizen(&"m2".into()).unwrap().unwrap().trust_level,
            TrustLevel::ClanVerified
        );
    }

    #[test]
    fn revocation_breaks_completeness_and_demotes() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        complete(&mut *txn);

        let out = engine()
            .revoke_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), &"m0".into(), NOW)
            .unwrap();
        assert!(!out.progress.is_complete);
        assert_eq!(out.progress.completed, 19);
        assert_eq!(out.transitions.len(), 5);
        for id in members() {
            assert_eq!(
                txn.citizen(&id).unwrap().unwrap().trust_level,
                TrustLevel::Unverified
            );
        }

        let again = engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), None, NOW)
            .unwrap();
        assert!(again.progress.is_complete);
        assert_eq!(again.transitions.len(), 5);
    }

    #[test]
    fn only_verifier_or_elevated_may_revoke() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), None, NOW)
            .unwrap();
        let err = engine()
            .revoke_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), &"m1".into(), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        engine()
            .revoke_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), &"rev".into(), NOW)
            .unwrap();
        let err = engine()
            .revoke_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), &"rev".into(), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyProcessed);
    }

    #[test]
    fn membership_rules() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        let err = engine()
            .assign_member(&mut *txn, &"out".into(), &g(), NOW)
            .unwrap_err();
        assert!(matches!(err, GroupError::GroupFull { .. }));
        let err = engine()
            .assign_member(&mut *txn, &"m0".into(), &GroupId::new("other"), NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionNotMet);
        let err = engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"out".into(), None, NOW)
            .unwrap_err();
        assert!(matches!(err, GroupError::NotMember { .. }));
        let err = engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m0".into(), None, NOW)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SelfReference);
    }

    #[test]
    fn leaving_a_complete_group_demotes_everyone() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        complete(&mut *txn);

        let change = engine().remove_member(&mut *txn, &"m4".into(), NOW).unwrap();
        assert_eq!(change.progress.member_count, 4);
        assert!(!change.progress.is_complete);
        assert_eq!(change.transitions.len(), 5);
        let leaver = txn.citizen(&"m4".into()).unwrap().unwrap();
        assert_eq!(leaver.trust_level, TrustLevel::Unverified);
        assert_eq!(leaver.current_group, None);

        let change = engine().assign_member(&mut *txn, &"out".into(), &g(), NOW).unwrap();
        assert_eq!(change.progress.member_count, 5);
        assert_eq!(change.progress.completed, 12);
    }

    #[test]
    fn queries() {
        let store = setup();
        let mut txn = store.write_txn().unwrap();
        engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m0".into(), &"m1".into(), Some("met in person".into()), NOW)
            .unwrap();
        engine()
            .submit_mutual_verification(&mut *txn, &g(), &"m2".into(), &"m0".into(), None, NOW)
            .unwrap();

        let matrix = engine().verification_matrix(&*txn, &g()).unwrap();
        assert_eq!(matrix.len(), 5);
        assert_eq!(matrix[&CitizenId::new("m1")], vec![CitizenId::new("m0")]);
        assert_eq!(matrix[&CitizenId::new("m0")], vec![CitizenId::new("m2")]);

        let todo = engine().unverified_members(&*txn, &g(), &"m0".into()).unwrap();
        assert_eq!(todo.len(), 3);
        assert!(!todo.contains(&CitizenId::new("m1")));

        let mine = engine().member_verifications(&*txn, &g(), &"m0".into()).unwrap();
        assert_eq!(mine.given.len(), 1);
        assert_eq!(mine.received.len(), 1);
        assert_eq!(mine.expected, 4);

        let progress = engine().progress(&*txn, &g()).unwrap();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.percentage, 10);
        assert_eq!(progress.remaining, 18);
    }
}
