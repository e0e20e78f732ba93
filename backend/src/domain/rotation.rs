//! Payout rotation ordering and pool arithmetic.
//!
//! The order for a cycle is computed once at cycle start and cached on
//! the cycle row; mid-cycle score changes never reshuffle the queue.

use crate::domain::models::{MemberView, MembershipStatus};

/// Share of the pool retained by the platform on each payout.
pub const PLATFORM_FEE_RATE: f64 = 0.01;

/// Deterministic payout order for a cycle.
///
/// Approved, non-defaulted members sort by trust score descending, ties
/// broken by earliest join date, then input order (the sort is stable).
/// Defaulted members are appended after all eligible members in input
/// order, regardless of score. Non-approved members never appear.
pub fn compute_order(members: &[MemberView]) -> Vec<String> {
    let approved: Vec<&MemberView> = members
        .iter()
        .filter(|m| m.member.status == MembershipStatus::Approved)
        .collect();

    let mut eligible: Vec<&MemberView> = approved
        .iter()
        .copied()
        .filter(|m| !m.member.has_defaulted)
        .collect();
    eligible.sort_by(|a, b| {
        b.trust_score
            .cmp(&a.trust_score)
            .then_with(|| match (a.member.join_date, b.member.join_date) {
                (Some(da), Some(db)) => da.cmp(&db),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
    });

    let defaulted = approved.iter().copied().filter(|m| m.member.has_defaulted);

    eligible
        .into_iter()
        .chain(defaulted)
        .map(|m| m.member.user_id.clone())
        .collect()
}

/// Pool-minus-fee amount the head of the queue receives:
/// contribution * approved member count * (1 - platform fee).
pub fn next_payout_amount(contribution_amount_btc: f64, approved_member_count: i64) -> f64 {
    contribution_amount_btc * approved_member_count as f64 * (1.0 - PLATFORM_FEE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{GroupMember, MembershipStatus};
    use chrono::{Duration, Utc};

    fn member(
        user_id: &str,
        score: i64,
        status: MembershipStatus,
        defaulted: bool,
        joined_days_ago: i64,
    ) -> MemberView {
        let now = Utc::now();
        MemberView {
            member: GroupMember {
                id: GroupMember::generate_id(),
                user_id: user_id.to_string(),
                group_id: "group::g".to_string(),
                status,
                join_date: Some(now - Duration::days(joined_days_ago)),
                total_contributions: 0,
                has_defaulted: defaulted,
                created_at: now,
                updated_at: now,
            },
            name: user_id.to_string(),
            trust_score: score,
        }
    }

    #[test]
    fn test_orders_by_score_descending() {
        let members = vec![
            member("u1", 600, MembershipStatus::Approved, false, 10),
            member("u2", 900, MembershipStatus::Approved, false, 10),
            member("u3", 750, MembershipStatus::Approved, false, 10),
        ];
        assert_eq!(compute_order(&members), vec!["u2", "u3", "u1"]);
    }

    #[test]
    fn test_tie_breaks_by_earliest_join_date() {
        let members = vec![
            member("late", 900, MembershipStatus::Approved, false, 5),
            member("early", 900, MembershipStatus::Approved, false, 30),
            member("third", 700, MembershipStatus::Approved, false, 1),
        ];
        assert_eq!(compute_order(&members), vec!["early", "late", "third"]);
    }

    #[test]
    fn test_equal_score_and_date_keeps_input_order() {
        let a = member("a", 900, MembershipStatus::Approved, false, 10);
        let mut b = member("b", 900, MembershipStatus::Approved, false, 10);
        b.member.join_date = a.member.join_date;
        let c = member("c", 700, MembershipStatus::Approved, false, 10);
        assert_eq!(compute_order(&[a, b, c]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_defaulted_members_sort_last_regardless_of_score() {
        let members = vec![
            member("d1", 950, MembershipStatus::Approved, true, 40),
            member("u1", 500, MembershipStatus::Approved, false, 10),
            member("u2", 300, MembershipStatus::Approved, false, 10),
            member("u3", 450, MembershipStatus::Approved, false, 10),
            member("u4", 800, MembershipStatus::Approved, false, 10),
        ];
        let order = compute_order(&members);
        assert_eq!(order, vec!["u4", "u1", "u3", "u2", "d1"]);
        assert_eq!(order.last().map(|s| s.as_str()), Some("d1"));
    }

    #[test]
    fn test_non_approved_members_excluded() {
        let members = vec![
            member("approved", 500, MembershipStatus::Approved, false, 10),
            member("pending", 900, MembershipStatus::Pending, false, 10),
            member("rejected", 900, MembershipStatus::Rejected, false, 10),
        ];
        assert_eq!(compute_order(&members), vec!["approved"]);
    }

    #[test]
    fn test_payout_amount_takes_platform_fee() {
        let amount = next_payout_amount(0.001, 10);
        assert!((amount - 0.0099).abs() < 1e-12);
    }
}
