use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::GroupLocks;
use crate::domain::models::{
    Cycle, Group, GroupStatus, MembershipStatus, Payment, PaymentStatus, PAYMENT_WINDOW_DAYS,
};
use crate::domain::rotation::compute_order;
use crate::domain::trust_service::TrustService;

/// Result of one cycle rollover.
#[derive(Debug, Clone)]
pub struct CycleAdvance {
    pub group: Group,
    pub new_cycle: Cycle,
    pub defaulted_members: Vec<String>,
}

/// Drives a group through its rotation periods.
///
/// Advancing a cycle is the only place defaults are declared: any
/// contribution still pending when its cycle closes goes Overdue and the
/// member takes the default penalty. The next cycle's payout order is
/// then computed from the post-penalty scores.
#[derive(Clone)]
pub struct CycleService {
    db: DbConnection,
    locks: GroupLocks,
    trust: TrustService,
}

impl CycleService {
    pub fn new(db: DbConnection, locks: GroupLocks, trust: TrustService) -> Self {
        Self { db, locks, trust }
    }

    /// Close the current cycle and open the next one. At the duration
    /// bound the call fails with `GroupAlreadyCompleted`; that first
    /// refused attempt still declares the final cycle's defaults and
    /// marks the group Completed.
    ///
    /// `expected_cycle_number` is the cycle the caller believes is
    /// current; a mismatch means another rollover won the race and the
    /// call fails with `StaleCycle` instead of skipping a cycle.
    pub async fn advance_cycle(
        &self,
        group_id: &str,
        caller_id: &str,
        expected_cycle_number: i64,
    ) -> DomainResult<CycleAdvance> {
        let lock = self.locks.for_group(group_id);
        let _guard = lock.lock().await;

        let mut group = self
            .db
            .get_group(group_id)
            .await?
            .ok_or(DomainError::NotFound("Group"))?;
        if group.admin_id != caller_id {
            return Err(DomainError::NotGroupAdmin);
        }
        if group.status == GroupStatus::Completed {
            return Err(DomainError::GroupAlreadyCompleted);
        }
        if group.current_cycle_number != expected_cycle_number {
            return Err(DomainError::StaleCycle);
        }

        let closing = group.current_cycle_number;
        let now = Utc::now();

        if closing >= group.total_cycles() {
            // The duration bound is reached: declare the final cycle's
            // defaults, finalize the group, and refuse to advance.
            self.declare_defaults(&group, closing).await?;
            group.status = GroupStatus::Completed;
            group.is_open = false;
            group.updated_at = now;
            self.db.update_group(&group).await?;
            info!("Group {} completed after cycle {}", group.id, closing);
            return Err(DomainError::GroupAlreadyCompleted);
        }

        let defaulted_members = self.declare_defaults(&group, closing).await?;
        group.updated_at = now;

        // Order is computed from post-penalty scores and frozen on the
        // cycle row.
        let members = self.db.list_member_views(&group.id).await?;
        let payout_order = compute_order(&members);

        let next_number = closing + 1;
        let cycle = Cycle {
            id: Cycle::generate_id(),
            group_id: group.id.clone(),
            cycle_number: next_number,
            start_date: now,
            end_date: now + Duration::weeks(group.frequency.cycle_length_weeks()),
            payout_order,
        };
        self.db.create_cycle(&cycle).await?;

        for view in members
            .iter()
            .filter(|m| m.member.status == MembershipStatus::Approved)
        {
            let payment = Payment {
                id: Payment::generate_id(),
                user_id: view.member.user_id.clone(),
                group_id: group.id.clone(),
                cycle_number: next_number,
                amount_btc: group.contribution_amount_btc,
                lightning_invoice: None,
                status: PaymentStatus::Pending,
                due_date: now + Duration::days(PAYMENT_WINDOW_DAYS),
                paid_at: None,
                created_at: now,
            };
            self.db.create_payment(&payment).await?;
        }

        group.current_cycle_number = next_number;
        self.db.update_group(&group).await?;

        info!(
            "Group {} advanced to cycle {} of {}",
            group.id,
            next_number,
            group.total_cycles()
        );
        Ok(CycleAdvance { group, new_cycle: cycle, defaulted_members })
    }

    /// Mark the closing cycle's unsettled contributions Overdue and apply
    /// the default penalty to each owing member.
    async fn declare_defaults(&self, group: &Group, cycle_number: i64) -> DomainResult<Vec<String>> {
        let unpaid = self
            .db
            .list_unpaid_payments_for_cycle(&group.id, cycle_number)
            .await?;

        let mut defaulted = Vec::new();
        for mut payment in unpaid {
            payment.status = PaymentStatus::Overdue;
            self.db.update_payment(&payment).await?;

            match self.db.get_member(&group.id, &payment.user_id).await? {
                Some(member) => {
                    self.trust.apply_default(&member).await?;
                    defaulted.push(payment.user_id.clone());
                }
                None => warn!(
                    "Unpaid contribution {} has no membership row in group {}",
                    payment.id, group.id
                ),
            }
        }
        Ok(defaulted)
    }
}
