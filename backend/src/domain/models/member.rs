use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

impl MembershipStatus {
    /// Convert to string for database storage
    pub fn to_string(&self) -> String {
        match self {
            MembershipStatus::Pending => "pending".to_string(),
            MembershipStatus::Approved => "approved".to_string(),
            MembershipStatus::Rejected => "rejected".to_string(),
            MembershipStatus::Suspended => "suspended".to_string(),
        }
    }

    /// Parse from string for database loading
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(MembershipStatus::Pending),
            "approved" => Ok(MembershipStatus::Approved),
            "rejected" => Ok(MembershipStatus::Rejected),
            "suspended" => Ok(MembershipStatus::Suspended),
            _ => Err(format!("Invalid membership status: {}", s)),
        }
    }
}

/// One user's participation in one group. Created as Pending on a join
/// request and only ever status-transitioned, never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub id: String,
    pub user_id: String,
    pub group_id: String,
    pub status: MembershipStatus,
    /// Set when the membership becomes Approved
    pub join_date: Option<DateTime<Utc>>,
    pub total_contributions: i64,
    pub has_defaulted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn generate_id() -> String {
        format!("member::{}", uuid::Uuid::new_v4())
    }
}

/// Member row joined through to its user. The trust score here is a
/// read-through projection of `users.trust_score`, never stored on the
/// membership itself.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberView {
    pub member: GroupMember,
    pub name: String,
    pub trust_score: i64,
}
