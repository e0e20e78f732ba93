use chrono::{DateTime, Utc};

/// A platform account. The trust score lives here, not on the per-group
/// membership rows: voting and payout decisions reference the user's
/// reputation across groups.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mavapay_wallet_id: Option<String>,
    /// Bounded to [0, 1000] by the trust engine
    pub trust_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn generate_id() -> String {
        format!("user::{}", uuid::Uuid::new_v4())
    }
}
