use proptest::prelude::*;

use arban_types::{
    CitizenId, EdgeId, EmissionLimit, Role, Timestamp, TrustLevel, TrustParams,
};

fn any_level() -> impl Strategy<Value = TrustLevel> {
    prop::sample::select(TrustLevel::ALL.to_vec())
}

fn any_role() -> impl Strategy<Value = Role> {
    prop::sample::select(vec![Role::Ordinary, Role::Reviewer, Role::Supreme])
}

proptest! {
    /// next() and previous() are inverses wherever both are defined.
    #[test]
    fn level_next_previous_inverse(level in any_level()) {
        if let Some(up) = level.next() {
            prop_assert!(up > level);
            prop_assert_eq!(up.previous(), Some(level));
        }
    }

    /// The emission limit never shrinks as the level rises.
    #[test]
    fn emission_limit_monotone_in_level(a in any_level(), b in any_level(), role in any_role()) {
        let params = TrustParams::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        match (params.emission_limit(lo, role), params.emission_limit(hi, role)) {
            (EmissionLimit::Limited(x), EmissionLimit::Limited(y)) => prop_assert!(x <= y),
            (EmissionLimit::Unbounded, hi_limit) => prop_assert!(hi_limit.is_unbounded()),
            (EmissionLimit::Limited(_), EmissionLimit::Unbounded) => {}
        }
    }

    /// A limited emission check agrees with manual arithmetic.
    #[test]
    fn limited_allows_matches_arithmetic(limit in 0u128..10_000, used in 0u128..10_000, amount in 0u128..10_000) {
        let allowed = EmissionLimit::Limited(limit).allows(used, amount);
        prop_assert_eq!(allowed, used + amount <= limit);
    }

    /// Remaining plus used covers the limit whenever used is within it.
    #[test]
    fn remaining_complements_used(limit in 0u128..10_000, used in 0u128..10_000) {
        let remaining = EmissionLimit::Limited(limit).remaining(used).unwrap();
        if used <= limit {
            prop_assert_eq!(remaining + used, limit);
        } else {
            prop_assert_eq!(remaining, 0);
        }
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        prop_assert_eq!(Timestamp::new(a) <= Timestamp::new(b), a <= b);
    }

    /// EdgeId big-endian keys sort the same way as the ids.
    #[test]
    fn edge_id_key_order(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let (ka, kb) = (EdgeId::new(a).to_be_bytes(), EdgeId::new(b).to_be_bytes());
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
    }

    /// CitizenId bincode serialization roundtrip.
    #[test]
    fn citizen_id_bincode_roundtrip(raw in "[a-z0-9_-]{1,32}") {
        let id = CitizenId::new(raw);
        let encoded = bincode::serialize(&id).unwrap();
        let decoded: CitizenId = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, id);
    }
}
