//! Completeness accounting.

use arban_store::{Citizen, GroupMutualVerification};
use arban_types::{CitizenId, GroupId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupProgress {
    pub group: GroupId,
    pub member_count: usize,
    /// Mutual verifications a full group needs.
    pub total: usize,
    pub completed: usize,
    /// `completed / total`, rounded to the nearest whole percent.
    pub percentage: u8,
    pub is_complete: bool,
    pub remaining: usize,
}

impl GroupProgress {
    /// Progress of `group` given its current members and every mutual
    /// verification recorded for it. Only active verifications between current
    /// members count, and nothing counts until the group is at full size.
    pub fn compute(
        group: &GroupId,
        members: &[Citizen],
        verifications: &[GroupMutualVerification],
        group_size: usize,
    ) -> Self {
        let total = group_size * group_size.saturating_sub(1);
        let member_count = members.len();
        let completed = if member_count == group_size {
            let ids: HashSet<&CitizenId> = members.iter().map(|m| &m.id).collect();
            verifications
                .iter()
                .filter(|v| v.is_active() && ids.contains(&v.verifier) && ids.contains(&v.verified))
                .count()
        } else {
            0
        };
        let percentage = if total == 0 {
            0
        } else {
            ((completed * 100 + total / 2) / total).min(100) as u8
        };
        Self {
            group: group.clone(),
            member_count,
            total,
            completed,
            percentage,
            is_complete: member_count == group_size && completed >= total,
            remaining: total.saturating_sub(completed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arban_types::{Role, Timestamp};

    fn members(n: usize, group: &GroupId) -> Vec<Citizen> {
        (0..n)
            .map(|i| {
                let mut c = Citizen::new(format!("m{i}").into(), Role::Ordinary, 5, Timestamp::EPOCH);
                c.current_group = Some(group.clone());
                c
            })
            .collect()
    }

    fn all_pairs(members: &[Citizen], group: &GroupId) -> Vec<GroupMutualVerification> {
        let mut out = Vec::new();
        for a in members {
            for b in members {
                if a.id != b.id {
                    out.push(GroupMutualVerification::new(
                        group.clone(),
                        a.id.clone(),
                        b.id.clone(),
                        None,
                        Timestamp::EPOCH,
                    ));
                }
            }
        }
        out
    }

    #[test]
    fn single_member_is_incomplete() {
        let g = GroupId::new("g");
        let p = GroupProgress::compute(&g, &members(1, &g), &[], 5);
        assert_eq!(p.total, 20);
        assert_eq!(p.completed, 0);
        assert!(!p.is_complete);
        assert_eq!(p.remaining, 20);
    }

    #[test]
    fn full_group_with_all_pairs_is_complete() {
        let g = GroupId::new("g");
        let m = members(5, &g);
        let v = all_pairs(&m, &g);
        let p = GroupProgress::compute(&g, &m, &v, 5);
        assert!(p.is_complete);
        assert_eq!(p.percentage, 100);
        assert_eq!(p.remaining, 0);
    }

    #[test]
    fn revoked_and_departed_edges_do_not_count() {
        let g = GroupId::new("g");
        let m = members(5, &g);
        let mut v = all_pairs(&m, &g);
        v[0].revoke(Timestamp::new(1));
        v.push(GroupMutualVerification::new(
            g.clone(),
            "m0".into(),
            "former".into(),
            None,
            Timestamp::EPOCH,
        ));
        let p = GroupProgress::compute(&g, &m, &v, 5);
        assert_eq!(p.completed, 19);
        assert_eq!(p.percentage, 95);
        assert!(!p.is_complete);
    }

    #[test]
    fn percentage_rounds() {
        let g = GroupId::new("g");
        let m = members(5, &g);
        let v: Vec<_> = all_pairs(&m, &g).into_iter().take(3).collect();
        assert_eq!(GroupProgress::compute(&g, &m, &v, 5).percentage, 15);
        let v: Vec<_> = all_pairs(&m, &g).into_iter().take(1).collect();
        assert_eq!(GroupProgress::compute(&g, &m, &v, 5).percentage, 5);
    }
}
