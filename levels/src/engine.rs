//! The level state machine.

use crate::error::LevelError;
use crate::transition::LevelTransition;
use arban_store::{Citizen, TrustRead, TrustWrite};
use arban_types::{CitizenId, LevelSource, Role, Timestamp, TrustLevel, TrustParams};

pub struct LevelEngine {
    pub(crate) params: TrustParams,
}

impl LevelEngine {
    pub fn new(params: TrustParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrustParams {
        &self.params
    }

    pub fn level_of<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
    ) -> Result<TrustLevel, LevelError> {
        Ok(load_citizen(txn, citizen)?.trust_level)
    }

    /// Supreme override: put `citizen` at `level`, bypassing requests.
    /// Returns `None` when the citizen is already there.
    pub fn set_level<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        level: TrustLevel,
        actor: &CitizenId,
        now: Timestamp,
    ) -> Result<Option<LevelTransition>, LevelError> {
        let actor = load_citizen(&*txn, actor)?;
        if !actor.role.can_override_level() {
            return Err(LevelError::Unauthorized {
                actor: actor.id,
                action: "override trust levels",
            });
        }
        let mut record = load_citizen(&*txn, citizen)?;
        let mut changed = false;
        if level == TrustLevel::FullyVerified && !record.is_verified {
            record.is_verified = true;
            record.verified_at = Some(now);
            changed = true;
        }
        if record.trust_level == level {
            if changed {
                txn.put_citizen(&record)?;
            }
            return Ok(None);
        }
        let transition = apply_level(
            &mut record,
            level,
            LevelSource::Override,
            Some(actor.id),
            now,
        );
        txn.put_citizen(&record)?;
        tracing::info!(
            citizen = %record.id,
            from = %transition.from,
            to = %transition.to,
            "trust level overridden"
        );
        Ok(Some(transition))
    }

    /// Group completeness reached: lift an `UNVERIFIED` member to
    /// `GROUP_VERIFIED`. Members already above are left alone.
    pub fn promote_to_group<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        now: Timestamp,
    ) -> Result<Option<LevelTransition>, LevelError> {
        let mut record = load_citizen(&*txn, citizen)?;
        if record.trust_level != TrustLevel::Unverified {
            return Ok(None);
        }
        let transition = apply_level(
            &mut record,
            TrustLevel::GroupVerified,
            LevelSource::Group,
            None,
            now,
        );
        record.group_verified_at = Some(now);
        txn.put_citizen(&record)?;
        tracing::info!(citizen = %record.id, group = ?record.current_group, "promoted by group");
        Ok(Some(transition))
    }

    /// Group completeness broken: drop a member back to `UNVERIFIED` if their
    /// `GROUP_VERIFIED` came from the group.
    pub fn demote_from_group<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        now: Timestamp,
    ) -> Result<Option<LevelTransition>, LevelError> {
        let mut record = load_citizen(&*txn, citizen)?;
        if record.trust_level != TrustLevel::GroupVerified
            || record.level_source != LevelSource::Group
        {
            return Ok(None);
        }
        let transition = apply_level(
            &mut record,
            TrustLevel::Unverified,
            LevelSource::Group,
            None,
            now,
        );
        record.group_verified_at = None;
        txn.put_citizen(&record)?;
        tracing::info!(citizen = %record.id, "demoted after group completeness broke");
        Ok(Some(transition))
    }

    /// Force every supreme-role citizen to `FULLY_VERIFIED` and verified.
    /// Running it again changes nothing.
    pub fn reconcile_trust_roots<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        now: Timestamp,
    ) -> Result<Vec<LevelTransition>, LevelError> {
        let mut transitions = Vec::new();
        for mut citizen in txn.citizens()? {
            if citizen.role != Role::Supreme {
                continue;
            }
            let needs_level = citizen.trust_level != TrustLevel::FullyVerified;
            if !needs_level && citizen.is_verified {
                continue;
            }
            if !citizen.is_verified {
                citizen.is_verified = true;
                citizen.verified_at = Some(now);
            }
            if needs_level {
                transitions.push(apply_level(
                    &mut citizen,
                    TrustLevel::FullyVerified,
                    LevelSource::Bootstrap,
                    None,
                    now,
                ));
            }
            txn.put_citizen(&citizen)?;
            tracing::info!(citizen = %citizen.id, "trust root reconciled");
        }
        Ok(transitions)
    }
}

/// Move `record` to `level` and stamp who and why.
pub(crate) fn apply_level(
    record: &mut Citizen,
    level: TrustLevel,
    source: LevelSource,
    by: Option<CitizenId>,
    now: Timestamp,
) -> LevelTransition {
    let from = record.trust_level;
    record.trust_level = level;
    record.level_source = source;
    record.level_set_at = Some(now);
    record.level_set_by = by.clone();
    LevelTransition {
        citizen: record.id.clone(),
        from,
        to: level,
        source,
        by,
        at: now,
    }
}

pub(crate) fn load_citizen<T: TrustRead + ?Sized>(
    txn: &T,
    id: &CitizenId,
) -> Result<Citizen, LevelError> {
    txn.citizen(id)?
        .ok_or_else(|| LevelError::CitizenNotFound(id.clone()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arban_nullables::NullTrustStore;
    use arban_store::TrustStore;
    use arban_types::ErrorKind;

    pub(crate) fn store_with(citizens: &[(&str, Role, TrustLevel)]) -> NullTrustStore {
        let store = NullTrustStore::new();
        let mut txn = store.write_txn().unwrap();
        for (id, role, level) in citizens {
            let mut c = Citizen::new((*id).into(), *role, 5, Timestamp::EPOCH);
            c.trust_level = *level;
            txn.put_citizen(&c).unwrap();
        }
        txn.commit().unwrap();
        store
    }

    fn engine() -> LevelEngine {
        LevelEngine::new(TrustParams::default())
    }

    #[test]
    fn override_requires_supreme() {
        let store = store_with(&[
            ("root", Role::Supreme, TrustLevel::Unverified),
            ("rev", Role::Reviewer, TrustLevel::Unverified),
            ("a", Role::Ordinary, TrustLevel::Unverified),
        ]);
        let mut txn = store.write_txn().unwrap();
        let err = engine()
            .set_level(&mut *txn, &"a".into(), TrustLevel::ClanVerified, &"rev".into(), Timestamp::new(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let t = engine()
            .set_level(&mut *txn, &"a".into(), TrustLevel::ClanVerified, &"root".into(), Timestamp::new(1))
            .unwrap()
            .unwrap();
        assert_eq!(t.from, TrustLevel::Unverified);
        assert_eq!(t.to, TrustLevel::ClanVerified);
        assert_eq!(t.source, LevelSource::Override);
        let a = txn.citizen(&"a".into()).unwrap().unwrap();
        assert_eq!(a.level_set_by, Some("root".into()));
        assert!(!a.is_verified);
    }

    #[test]
    fn override_to_fully_marks_verified() {
        let store = store_with(&[
            ("root", Role::Supreme, TrustLevel::FullyVerified),
            ("a", Role::Ordinary, TrustLevel::Unverified),
        ]);
        let mut txn = store.write_txn().unwrap();
        engine()
            .set_level(&mut *txn, &"a".into(), TrustLevel::FullyVerified, &"root".into(), Timestamp::new(1))
            .unwrap();
        assert!(txn.citizen(&"a".into()).unwrap().unwrap().is_verified);
        let again = engine()
            .set_level(&mut *txn, &"a".into(), TrustLevel::FullyVerified, &"root".into(), Timestamp::new(2))
            .unwrap();
        assert!(again.is_none());
    }

    #[test]
    fn demotion_only_undoes_group_promotion() {
        let store = store_with(&[
            ("root", Role::Supreme, TrustLevel::FullyVerified),
            ("a", Role::Ordinary, TrustLevel::Unverified),
            ("b", Role::Ordinary, TrustLevel::Unverified),
        ]);
        let mut txn = store.write_txn().unwrap();
        let now = Timestamp::new(5);
        assert!(engine().promote_to_group(&mut *txn, &"a".into(), now).unwrap().is_some());
        assert!(engine().promote_to_group(&mut *txn, &"a".into(), now).unwrap().is_none());
        engine()
            .set_level(&mut *txn, &"b".into(), TrustLevel::GroupVerified, &"root".into(), now)
            .unwrap();

        let t = engine().demote_from_group(&mut *txn, &"a".into(), now).unwrap().unwrap();
        assert_eq!(t.to, TrustLevel::Unverified);
        assert!(engine().demote_from_group(&mut *txn, &"b".into(), now).unwrap().is_none());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let store = store_with(&[
            ("root", Role::Supreme, TrustLevel::Unverified),
            ("a", Role::Ordinary, TrustLevel::Unverified),
        ]);
        let mut txn = store.write_txn().unwrap();
        let first = engine().reconcile_trust_roots(&mut *txn, Timestamp::new(1)).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].source, LevelSource::Bootstrap);
        let root = txn.citizen(&"root".into()).unwrap().unwrap();
        assert!(root.is_verified);
        assert_eq!(root.trust_level, TrustLevel::FullyVerified);

        let second = engine().reconcile_trust_roots(&mut *txn, Timestamp::new(2)).unwrap();
        assert!(second.is_empty());
        assert_eq!(
            txn.citizen(&"a".into()).unwrap().unwrap().trust_level,
            TrustLevel::Unverified
        );
    }
}
