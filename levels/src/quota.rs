//! Emission quotas.
//!
//! `GROUP_VERIFIED` citizens share one allowance across their group: the check
//! sums `total_emitted` over every current member. Other levels are checked
//! individually. A `GROUP_VERIFIED` citizen outside any group falls back to the
//! individual check.

use crate::engine::{load_citizen, LevelEngine};
use crate::error::LevelError;
use arban_store::{Citizen, TrustRead, TrustWrite};
use arban_types::{CitizenId, EmissionLimit, TrustLevel};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionStatus {
    pub citizen: CitizenId,
    pub level: TrustLevel,
    pub limit: EmissionLimit,
    /// This citizen's cumulative emission.
    pub individual_used: u128,
    /// Group total when the allowance is pooled.
    pub group_used: Option<u128>,
    /// Headroom left; `None` when unbounded.
    pub remaining: Option<u128>,
}

impl EmissionStatus {
    pub fn is_unbounded(&self) -> bool {
        self.limit.is_unbounded()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionReceipt {
    pub citizen: CitizenId,
    pub amount: u128,
    pub total_emitted: u128,
    pub remaining: Option<u128>,
}

impl LevelEngine {
    pub fn emission_limit(&self, citizen: &Citizen) -> EmissionLimit {
        self.params.emission_limit(citizen.trust_level, citizen.role)
    }

    /// Usage the limit is checked against, and whether it is the group pool.
    fn usage<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &Citizen,
    ) -> Result<(u128, bool), LevelError> {
        if citizen.trust_level.is_group_pooled() && !citizen.role.has_unlimited_emission() {
            if let Some(group) = &citizen.current_group {
                let pooled = txn
                    .group_members(group)?
                    .iter()
                    .fold(0u128, |sum, m| sum.saturating_add(m.total_emitted));
                return Ok((pooled, true));
            }
        }
        Ok((citizen.total_emitted, false))
    }

    pub fn can_emit<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
        amount: u128,
    ) -> Result<bool, LevelError> {
        let record = load_citizen(txn, citizen)?;
        let (used, _) = self.usage(txn, &record)?;
        Ok(self.emission_limit(&record).allows(used, amount))
    }

    /// Add `amount` to the citizen's total after re-checking the quota. On
    /// failure nothing is written.
    pub fn record_emission<W: TrustWrite + ?Sized>(
        &self,
        txn: &mut W,
        citizen: &CitizenId,
        amount: u128,
    ) -> Result<EmissionReceipt, LevelError> {
        if amount == 0 {
            return Err(LevelError::ZeroEmission);
        }
        let mut record = load_citizen(&*txn, citizen)?;
        let limit = self.emission_limit(&record);
        let (used, _) = self.usage(&*txn, &record)?;
        let total_emitted = match record.total_emitted.checked_add(amount) {
            Some(total) if limit.allows(used, amount) => total,
            _ => {
                return Err(LevelError::EmissionExceeded {
                    citizen: record.id,
                    amount,
                    used,
                    limit,
                })
            }
        };
        record.total_emitted = total_emitted;
        txn.put_citizen(&record)?;
        tracing::debug!(citizen = %record.id, amount, total = total_emitted, "emission recorded");
        Ok(EmissionReceipt {
            citizen: record.id,
            amount,
            total_emitted,
            remaining: limit.remaining(used.saturating_add(amount)),
        })
    }

    pub fn emission_status<T: TrustRead + ?Sized>(
        &self,
        txn: &T,
        citizen: &CitizenId,
    ) -> Result<EmissionStatus, LevelError> {
        let record = load_citizen(txn, citizen)?;
        let limit = self.emission_limit(&record);
        let (used, pooled) = self.usage(txn, &record)?;
        Ok(EmissionStatus {
            level: record.trust_level,
            limit,
            individual_used: record.total_emitted,
            group_used: pooled.then_some(used),
            remaining: limit.remaining(used),
            citizen: record.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::tests::store_with;
    use crate::{LevelEngine, LevelError};
    use arban_store::{TrustRead, TrustStore, TrustWrite};
    use arban_types::{ErrorKind, GroupId, Role, TrustLevel, TrustParams};

    fn engine() -> LevelEngine {
        LevelEngine::new(TrustParams::default())
    }

    #[test]
    fn unverified_citizen_is_capped_individually() {
        let store = store_with(&[("a", Role::Ordinary, TrustLevel::Unverified)]);
        let mut txn = store.write_txn().unwrap();
        engine().record_emission(&mut *txn, &"a".into(), 60).unwrap();
        assert!(engine().can_emit(&*txn, &"a".into(), 40).unwrap());
        assert!(!engine().can_emit(&*txn, &"a".into(), 41).unwrap());

        let err = engine().record_emission(&mut *txn, &"a".into(), 41).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExhausted);
        assert_eq!(txn.citizen(&"a".into()).unwrap().unwrap().total_emitted, 60);

        let receipt = engine().record_emission(&mut *txn, &"a".into(), 40).unwrap();
        assert_eq!(receipt.total_emitted, 100);
        assert_eq!(receipt.remaining, Some(0));
    }

    #[test]
    fn group_allowance_is_pooled() {
        let names = ["m0", "m1", "m2", "m3", "m4"];
        let store = store_with(&[
            ("m0", Role::Ordinary, TrustLevel::GroupVerified),
            ("m1", Role::Ordinary, TrustLevel::GroupVerified),
            ("m2", Role::Ordinary, TrustLevel::GroupVerified),
            ("m3", Role::Ordinary, TrustLevel::GroupVerified),
            ("m4", Role::Ordinary, TrustLevel::GroupVerified),
        ]);
        let mut txn = store.write_txn().unwrap();
        let group = GroupId::new("g");
        for name in names {
            let mut c = txn.citizen(&name.into()).unwrap().unwrap();
            c.current_group = Some(group.clone());
            txn.put_citizen(&c).unwrap();
        }
        for name in names {
            engine().record_emission(&mut *txn, &name.into(), 200).unwrap();
        }
        for name in names {
            assert!(!engine().can_emit(&*txn, &name.into(), 1).unwrap());
            assert!(engine().can_emit(&*txn, &name.into(), 0).unwrap());
        }
        let status = engine().emission_status(&*txn, &"m0".into()).unwrap();
        assert_eq!(status.group_used, Some(1000));
        assert_eq!(status.individual_used, 200);
        assert_eq!(status.remaining, Some(0));
    }

    #[test]
    fn ungrouped_group_level_falls_back_to_individual() {
        let store = store_with(&[("solo", Role::Ordinary, TrustLevel::GroupVerified)]);
        let mut txn = store.write_txn().unwrap();
        engine().record_emission(&mut *txn, &"solo".into(), 1000).unwrap();
        let status = engine().emission_status(&*txn, &"solo".into()).unwrap();
        assert_eq!(status.group_used, None);
        assert!(!engine().can_emit(&*txn, &"solo".into(), 1).unwrap());
    }

    #[test]
    fn clan_and_supreme_are_unbounded() {
        let store = store_with(&[
            ("clan", Role::Ordinary, TrustLevel::ClanVerified),
            ("root", Role::Supreme, TrustLevel::Unverified),
        ]);
        let mut txn = store.write_txn().unwrap();
        for id in ["clan", "root"] {
            engine().record_emission(&mut *txn, &id.into(), 1_000_000).unwrap();
            let status = engine().emission_status(&*txn, &id.into()).unwrap();
            assert!(status.is_unbounded());
            assert_eq!(status.remaining, None);
        }
    }

    #[test]
    fn zero_and_unknown_are_rejected() {
        let store = store_with(&[("a", Role::Ordinary, TrustLevel::Unverified)]);
        let mut txn = store.write_txn().unwrap();
        assert!(matches!(
            engine().record_emission(&mut *txn, &"a".into(), 0),
            Err(LevelError::ZeroEmission)
        ));
        assert_eq!(
            engine()
                .record_emission(&mut *txn, &"ghost".into(), 1)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }
}
