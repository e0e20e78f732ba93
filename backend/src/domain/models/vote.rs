use chrono::{DateTime, Utc};

/// Percentage of the voter snapshot that must approve an application.
pub const REQUIRED_PERCENTAGE: i64 = 60;

/// How long an application stays open for ballots.
pub const VOTE_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteStatus {
    Pending,
    Approved,
    Rejected,
    /// Deadline passed while still Pending. Distinct from Rejected: the
    /// voters never resolved the application.
    Expired,
}

impl VoteStatus {
    /// Convert to string for database storage
    pub fn to_string(&self) -> String {
        match self {
            VoteStatus::Pending => "pending".to_string(),
            VoteStatus::Approved => "approved".to_string(),
            VoteStatus::Rejected => "rejected".to_string(),
            VoteStatus::Expired => "expired".to_string(),
        }
    }

    /// Parse from string for database loading
    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(VoteStatus::Pending),
            "approved" => Ok(VoteStatus::Approved),
            "rejected" => Ok(VoteStatus::Rejected),
            "expired" => Ok(VoteStatus::Expired),
            _ => Err(format!("Invalid vote status: {}", s)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VoteStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteDecision {
    Approve,
    Reject,
}

impl VoteDecision {
    pub fn to_string(&self) -> String {
        match self {
            VoteDecision::Approve => "approve".to_string(),
            VoteDecision::Reject => "reject".to_string(),
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(VoteDecision::Approve),
            "reject" => Ok(VoteDecision::Reject),
            _ => Err(format!("Invalid vote decision: {}", s)),
        }
    }
}

/// One pending join request and its running tallies.
///
/// `total_voters` is snapshotted as the approved-member count when the
/// application is created and never regrown, so the 60% threshold stays
/// stable while the vote runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Vote {
    pub id: String,
    pub group_id: String,
    pub applicant_id: String,
    pub approvals: i64,
    pub rejections: i64,
    pub total_voters: i64,
    pub required_percentage: i64,
    pub deadline: DateTime<Utc>,
    pub status: VoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn generate_id() -> String {
        format!("vote::{}", uuid::Uuid::new_v4())
    }

    pub fn percent_approved(&self) -> f64 {
        if self.total_voters == 0 {
            return 0.0;
        }
        self.approvals as f64 / self.total_voters as f64 * 100.0
    }

    /// Voters in the snapshot who have not cast a ballot yet.
    pub fn outstanding_ballots(&self) -> i64 {
        self.total_voters - self.approvals - self.rejections
    }

    /// Terminal state implied by the current tallies, if any.
    ///
    /// Approves as soon as the threshold is met. Rejects once the
    /// approval side can no longer reach the threshold even if every
    /// outstanding voter approves.
    pub fn resolve(&self) -> VoteStatus {
        if self.percent_approved() >= self.required_percentage as f64 {
            return VoteStatus::Approved;
        }
        let best_possible = self.approvals + self.outstanding_ballots();
        let best_percent = if self.total_voters == 0 {
            0.0
        } else {
            best_possible as f64 / self.total_voters as f64 * 100.0
        };
        if best_percent < self.required_percentage as f64 {
            return VoteStatus::Rejected;
        }
        VoteStatus::Pending
    }
}

/// A single voter's recorded decision, kept so ballots are idempotent per
/// voter and editable until the deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteBallot {
    pub vote_id: String,
    pub voter_id: String,
    pub decision: VoteDecision,
    pub cast_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn vote(approvals: i64, rejections: i64, total_voters: i64) -> Vote {
        let now = Utc::now();
        Vote {
            id: Vote::generate_id(),
            group_id: "group::g".to_string(),
            applicant_id: "user::a".to_string(),
            approvals,
            rejections,
            total_voters,
            required_percentage: REQUIRED_PERCENTAGE,
            deadline: now + chrono::Duration::days(VOTE_WINDOW_DAYS),
            status: VoteStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_approves_at_threshold() {
        // 6 of 9 approvals is 66.7% >= 60%
        assert_eq!(vote(6, 0, 9).resolve(), VoteStatus::Approved);
        // exactly 60%
        assert_eq!(vote(3, 0, 5).resolve(), VoteStatus::Approved);
    }

    #[test]
    fn test_pending_while_recoverable() {
        // 2 of 9 approved so far, 55.6% still possible? 2+7=9 -> 100%
        assert_eq!(vote(2, 0, 9).resolve(), VoteStatus::Pending);
        assert_eq!(vote(0, 3, 9).resolve(), VoteStatus::Pending);
    }

    #[test]
    fn test_rejects_when_unrecoverable() {
        // 4 rejections of 9 leaves at most 5/9 = 55.6% approvals
        assert_eq!(vote(0, 4, 9).resolve(), VoteStatus::Rejected);
        assert_eq!(vote(2, 4, 9).resolve(), VoteStatus::Rejected);
    }

    #[test]
    fn test_all_ballots_in_below_threshold_rejects() {
        assert_eq!(vote(5, 4, 9).resolve(), VoteStatus::Rejected);
    }

    #[test]
    fn test_empty_voter_set_never_approves() {
        assert_eq!(vote(0, 0, 0).resolve(), VoteStatus::Rejected);
    }

    #[test]
    fn test_tally_invariant_holds() {
        let v = vote(2, 3, 9);
        assert!(v.approvals + v.rejections <= v.total_voters);
        assert_eq!(v.outstanding_ballots(), 4);
    }
}
