use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Weekly,
    Monthly,
}

impl Frequency {
    /// Convert to string for database storage
    pub fn to_string(&self) -> String {
        match self {
            Frequency::Weekly => "weekly".to_string(),
            Frequency::Monthly => "monthly".to_string(),
        }
    }

    /// Parse from string for database loading
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(format!("Invalid frequency: {}", s)),
        }
    }

    /// Length of one contribution cycle. Monthly cadence is approximated
    /// as four weeks, not calendar months.
    pub fn cycle_length_weeks(&self) -> i64 {
        match self {
            Frequency::Weekly => 1,
            Frequency::Monthly => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    Active,
    Completed,
    Cancelled,
}

impl GroupStatus {
    pub fn to_string(&self) -> String {
        match self {
            GroupStatus::Active => "active".to_string(),
            GroupStatus::Completed => "completed".to_string(),
            GroupStatus::Cancelled => "cancelled".to_string(),
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GroupStatus::Active),
            "completed" => Ok(GroupStatus::Completed),
            "cancelled" => Ok(GroupStatus::Cancelled),
            _ => Err(format!("Invalid group status: {}", s)),
        }
    }
}

/// A rotating savings circle. Owns its members and cycles; the cap
/// invariant (approved members <= member_cap) is enforced by the domain
/// layer before any membership write.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub admin_id: String,
    pub contribution_amount_btc: f64,
    pub frequency: Frequency,
    pub duration_weeks: i64,
    pub member_cap: i64,
    pub is_open: bool,
    pub status: GroupStatus,
    /// Starts at 1 on creation
    pub current_cycle_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn generate_id() -> String {
        format!("group::{}", uuid::Uuid::new_v4())
    }

    /// Total number of cycles this group runs before completing:
    /// ceil(duration_weeks / cycle_length_weeks).
    pub fn total_cycles(&self) -> i64 {
        let len = self.frequency.cycle_length_weeks();
        (self.duration_weeks + len - 1) / len
    }
}
