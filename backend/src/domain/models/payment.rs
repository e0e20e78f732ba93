use chrono::{DateTime, Utc};

/// Days a member has to settle a contribution after its cycle starts.
pub const PAYMENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
    Failed,
}

impl PaymentStatus {
    /// Convert to string for database storage
    pub fn to_string(&self) -> String {
        match self {
            PaymentStatus::Pending => "pending".to_string(),
            PaymentStatus::Paid => "paid".to_string(),
            PaymentStatus::Overdue => "overdue".to_string(),
            PaymentStatus::Failed => "failed".to_string(),
        }
    }

    /// Parse from string for database loading
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "overdue" => Ok(PaymentStatus::Overdue),
            "failed" => Ok(PaymentStatus::Failed),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

/// One due contribution instance. Each successful payment drives a trust
/// score update (on-time vs late against `due_date`).
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub cycle_number: i64,
    pub amount_btc: f64,
    pub lightning_invoice: Option<String>,
    pub status: PaymentStatus,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn generate_id() -> String {
        format!("payment::{}", uuid::Uuid::new_v4())
    }
}
