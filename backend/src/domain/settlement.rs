//! Seams for the external payment collaborators.
//!
//! The core only consumes opaque results from these gateways: a transfer
//! reference for payouts, an invoice string for contributions. Retry and
//! failure handling of the transfer itself stays on the collaborator
//! side; the core just marks the payout Failed when a call errors.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use crate::domain::models::{Payment, User};

/// Wallet-linking and payout transfer collaborator (Mavapay in
/// production).
pub trait SettlementGateway: Send + Sync + Clone {
    fn is_wallet_linked(&self, user: &User) -> bool;

    /// Returns an opaque settlement reference for the transfer.
    fn initiate_transfer(&self, user: &User, amount_btc: f64) -> Result<String>;
}

/// Lightning invoice collaborator.
pub trait PaymentGateway: Send + Sync + Clone {
    /// Returns the invoice string and its expiry.
    fn create_invoice(&self, payment: &Payment) -> Result<(String, DateTime<Utc>)>;
}

/// Stand-in settlement gateway; hands out canned transfer references.
#[derive(Debug, Clone, Default)]
pub struct MockMavapayGateway;

impl SettlementGateway for MockMavapayGateway {
    fn is_wallet_linked(&self, user: &User) -> bool {
        user.mavapay_wallet_id.is_some()
    }

    fn initiate_transfer(&self, _user: &User, _amount_btc: f64) -> Result<String> {
        Ok(format!("mavapay::{}", uuid::Uuid::new_v4()))
    }
}

/// Stand-in Lightning gateway; invoices expire after an hour.
#[derive(Debug, Clone, Default)]
pub struct MockLightningGateway;

impl PaymentGateway for MockLightningGateway {
    fn create_invoice(&self, _payment: &Payment) -> Result<(String, DateTime<Utc>)> {
        let invoice = format!("lnbc1{}", uuid::Uuid::new_v4().simple());
        Ok((invoice, Utc::now() + Duration::hours(1)))
    }
}
