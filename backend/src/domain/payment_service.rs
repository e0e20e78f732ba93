use chrono::Utc;
use tracing::info;

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Payment, PaymentStatus};
use crate::domain::settlement::PaymentGateway;
use crate::domain::trust_service::TrustService;

/// A settled contribution together with the trust score it produced.
#[derive(Debug, Clone)]
pub struct ContributionReceipt {
    pub payment: Payment,
    pub on_time: bool,
    pub new_trust_score: i64,
}

/// Contribution handling: invoice issuance and settlement verification.
///
/// Verification is the trust engine's input signal: settling within the
/// payment window rewards the score, settling after it penalizes.
#[derive(Clone)]
pub struct PaymentService<G: PaymentGateway> {
    db: DbConnection,
    gateway: G,
    trust: TrustService,
}

impl<G: PaymentGateway> PaymentService<G> {
    pub fn new(db: DbConnection, gateway: G, trust: TrustService) -> Self {
        Self { db, gateway, trust }
    }

    pub async fn list_for_user(&self, user_id: &str) -> DomainResult<Vec<Payment>> {
        Ok(self.db.list_payments_for_user(user_id).await?)
    }

    /// Issue a Lightning invoice for an outstanding contribution. The
    /// invoice is stored on the payment row; the expiry is returned
    /// alongside for the client.
    pub async fn create_invoice(
        &self,
        payment_id: &str,
        caller_id: &str,
    ) -> DomainResult<(Payment, chrono::DateTime<Utc>)> {
        let mut payment = self.load_owned(payment_id, caller_id).await?;
        if payment.status == PaymentStatus::Paid {
            return Err(DomainError::validation("Contribution is already settled"));
        }

        let (invoice, expires_at) = self.gateway.create_invoice(&payment)?;
        payment.lightning_invoice = Some(invoice);
        self.db.update_payment(&payment).await?;

        info!(
            "Issued invoice for payment {} (expires {})",
            payment.id, expires_at
        );
        Ok((payment, expires_at))
    }

    /// Record a settled contribution and feed the result into the trust
    /// engine. A payment is on time when it settles no later than its due
    /// date; Overdue payments settled after rollover still count as late.
    pub async fn verify_payment(
        &self,
        payment_id: &str,
        caller_id: &str,
    ) -> DomainResult<ContributionReceipt> {
        let mut payment = self.load_owned(payment_id, caller_id).await?;
        if payment.status == PaymentStatus::Paid {
            return Err(DomainError::validation("Contribution is already settled"));
        }

        let now = Utc::now();
        payment.status = PaymentStatus::Paid;
        payment.paid_at = Some(now);
        self.db.update_payment(&payment).await?;

        let on_time = now <= payment.due_date;
        let new_trust_score = if on_time {
            self.trust.apply_on_time_payment(&payment.user_id).await?
        } else {
            self.trust.apply_late_payment(&payment.user_id).await?
        };

        if let Some(mut member) = self.db.get_member(&payment.group_id, &payment.user_id).await? {
            member.total_contributions += 1;
            member.updated_at = now;
            self.db.update_member(&member).await?;
        }

        info!(
            "Payment {} settled {} for {}",
            payment.id,
            if on_time { "on time" } else { "late" },
            payment.user_id
        );
        Ok(ContributionReceipt { payment, on_time, new_trust_score })
    }

    async fn load_owned(&self, payment_id: &str, caller_id: &str) -> DomainResult<Payment> {
        let payment = self
            .db
            .get_payment(payment_id)
            .await?
            .ok_or(DomainError::NotFound("Payment"))?;
        if payment.user_id != caller_id {
            return Err(DomainError::NotFound("Payment"));
        }
        Ok(payment)
    }
}
