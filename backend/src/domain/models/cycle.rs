use chrono::{DateTime, Utc};

/// One rotation period within a group. The payout order is computed once
/// at cycle start and stays fixed for the cycle's duration, even if trust
/// scores move afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub id: String,
    pub group_id: String,
    pub cycle_number: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// User ids, head of the queue first
    pub payout_order: Vec<String>,
}

impl Cycle {
    pub fn generate_id() -> String {
        format!("cycle::{}", uuid::Uuid::new_v4())
    }

    /// The member due to receive this cycle's pooled payout.
    pub fn next_payout_user(&self) -> Option<&str> {
        self.payout_order.first().map(|s| s.as_str())
    }
}
