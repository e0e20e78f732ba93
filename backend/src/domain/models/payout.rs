use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStatus {
    Pending,
    Processing,
    Paid,
    Failed,
}

impl PayoutStatus {
    /// Convert to string for database storage
    pub fn to_string(&self) -> String {
        match self {
            PayoutStatus::Pending => "pending".to_string(),
            PayoutStatus::Processing => "processing".to_string(),
            PayoutStatus::Paid => "paid".to_string(),
            PayoutStatus::Failed => "failed".to_string(),
        }
    }

    /// Parse from string for database loading
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PayoutStatus::Pending),
            "processing" => Ok(PayoutStatus::Processing),
            "paid" => Ok(PayoutStatus::Paid),
            "failed" => Ok(PayoutStatus::Failed),
            _ => Err(format!("Invalid payout status: {}", s)),
        }
    }
}

/// One disbursement of the pooled contributions to the member at the head
/// of the rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub cycle_number: i64,
    /// Pool minus the platform fee
    pub amount_btc: f64,
    pub status: PayoutStatus,
    /// Settlement reference returned by the transfer collaborator
    pub mavapay_ref: Option<String>,
    pub trust_score_at_payout: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payout {
    pub fn generate_id() -> String {
        format!("payout::{}", uuid::Uuid::new_v4())
    }
}
