use chrono::Utc;
use tracing::{error, info};

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::GroupLocks;
use crate::domain::models::{GroupStatus, MemberView, Payout, PayoutStatus};
use crate::domain::rotation::next_payout_amount;
use crate::domain::settlement::SettlementGateway;

/// One slot in a cycle's payout queue.
#[derive(Debug, Clone)]
pub struct QueueSlot {
    pub position: usize,
    pub view: MemberView,
}

/// Disburses the pooled contributions to the member at the head of the
/// cycle's frozen payout order.
#[derive(Clone)]
pub struct PayoutService<G: SettlementGateway> {
    db: DbConnection,
    locks: GroupLocks,
    gateway: G,
}

impl<G: SettlementGateway> PayoutService<G> {
    pub fn new(db: DbConnection, locks: GroupLocks, gateway: G) -> Self {
        Self { db, locks, gateway }
    }

    pub async fn list_for_user(&self, user_id: &str) -> DomainResult<Vec<Payout>> {
        Ok(self.db.list_payouts_for_user(user_id).await?)
    }

    /// The current cycle's queue in payout order, joined through to each
    /// member's name and live trust score.
    pub async fn queue(&self, group_id: &str) -> DomainResult<Vec<QueueSlot>> {
        let group = self
            .db
            .get_group(group_id)
            .await?
            .ok_or(DomainError::NotFound("Group"))?;
        let cycle = self
            .db
            .get_cycle(group_id, group.current_cycle_number)
            .await?
            .ok_or(DomainError::NotFound("Cycle"))?;
        let members = self.db.list_member_views(group_id).await?;

        let slots = cycle
            .payout_order
            .iter()
            .enumerate()
            .filter_map(|(i, user_id)| {
                members
                    .iter()
                    .find(|m| &m.member.user_id == user_id)
                    .map(|view| QueueSlot { position: i + 1, view: view.clone() })
            })
            .collect();
        Ok(slots)
    }

    /// Disburse the pool to the caller. Only the head of the queue may
    /// claim, exactly once per cycle, and only with a linked wallet.
    ///
    /// A failed transfer is recorded as a Failed payout; the caller may
    /// retry once the gateway recovers.
    pub async fn request_payout(&self, group_id: &str, caller_id: &str) -> DomainResult<Payout> {
        let lock = self.locks.for_group(group_id);
        let _guard = lock.lock().await;

        let group = self
            .db
            .get_group(group_id)
            .await?
            .ok_or(DomainError::NotFound("Group"))?;
        if group.status == GroupStatus::Completed {
            return Err(DomainError::GroupAlreadyCompleted);
        }
        let cycle = self
            .db
            .get_cycle(group_id, group.current_cycle_number)
            .await?
            .ok_or(DomainError::NotFound("Cycle"))?;

        if cycle.next_payout_user() != Some(caller_id) {
            return Err(DomainError::OutOfTurn);
        }
        let already_disbursed = self
            .db
            .list_payouts_for_cycle(group_id, cycle.cycle_number)
            .await?
            .iter()
            .any(|p| p.status == PayoutStatus::Paid);
        if already_disbursed {
            return Err(DomainError::validation(
                "This cycle's payout has already been disbursed",
            ));
        }

        let user = self
            .db
            .get_user(caller_id)
            .await?
            .ok_or(DomainError::NotFound("User"))?;
        if !self.gateway.is_wallet_linked(&user) {
            return Err(DomainError::WalletNotLinked);
        }

        let contributors = self.db.count_approved_members(group_id).await?;
        let amount_btc = next_payout_amount(group.contribution_amount_btc, contributors);

        let now = Utc::now();
        let mut payout = Payout {
            id: Payout::generate_id(),
            user_id: user.id.clone(),
            group_id: group.id.clone(),
            cycle_number: cycle.cycle_number,
            amount_btc,
            status: PayoutStatus::Processing,
            mavapay_ref: None,
            trust_score_at_payout: user.trust_score,
            paid_at: None,
            created_at: now,
        };

        match self.gateway.initiate_transfer(&user, amount_btc) {
            Ok(reference) => {
                payout.status = PayoutStatus::Paid;
                payout.mavapay_ref = Some(reference);
                payout.paid_at = Some(Utc::now());
                info!(
                    "Paid out {} BTC to {} for group {} cycle {}",
                    amount_btc, user.id, group.id, cycle.cycle_number
                );
            }
            Err(e) => {
                payout.status = PayoutStatus::Failed;
                error!(
                    "Transfer failed for {} in group {} cycle {}: {}",
                    user.id, group.id, cycle.cycle_number, e
                );
            }
        }
        self.db.create_payout(&payout).await?;
        Ok(payout)
    }
}
