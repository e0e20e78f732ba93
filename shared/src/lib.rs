use serde::{Deserialize, Serialize};

/// Standard envelope for every API response.
///
/// `data` is omitted from the JSON body on failures so clients can key off
/// `success` + `message` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Users / profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Bounded reputation score, 0..=1000
    pub trust_score: i64,
    /// Display label derived from the score ("Excellent", "Good", ...)
    pub trust_level: String,
    /// Score as a percentage of the maximum, for progress bars
    pub trust_progress: f64,
    pub mavapay_linked: bool,
    pub mavapay_wallet_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkWalletRequest {
    pub wallet_id: String,
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    /// Per-member contribution for one cycle, in BTC
    pub contribution_amount_btc: f64,
    /// "weekly" or "monthly"
    pub frequency: String,
    pub duration_weeks: i64,
    pub member_cap: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub admin_id: String,
    pub contribution_amount_btc: f64,
    pub frequency: String,
    pub duration_weeks: i64,
    pub member_cap: i64,
    /// Approved members only
    pub members_count: i64,
    pub is_open: bool,
    /// "active", "completed" or "cancelled"
    pub status: String,
    pub current_cycle_number: i64,
    pub total_cycles: i64,
    /// RFC 3339
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMemberEntry {
    pub user_id: String,
    pub name: String,
    /// "pending", "approved", "rejected" or "suspended"
    pub status: String,
    pub trust_score: i64,
    pub total_contributions: i64,
    pub has_defaulted: bool,
    /// RFC 3339; only present once approved
    pub join_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetail {
    pub group: GroupSummary,
    pub members: Vec<GroupMemberEntry>,
    /// Payout order of the current cycle (user ids, head of queue first)
    pub payout_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupListResponse {
    pub groups: Vec<GroupSummary>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetGroupStatusRequest {
    /// true reopens the group for join requests, false closes it
    pub is_open: bool,
}

// ---------------------------------------------------------------------------
// Membership votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteApplicationEntry {
    pub id: String,
    pub group_id: String,
    pub applicant_id: String,
    pub applicant_name: String,
    pub applicant_trust_score: i64,
    pub approvals: i64,
    pub rejections: i64,
    pub total_voters: i64,
    pub required_percentage: i64,
    /// RFC 3339
    pub deadline: String,
    /// "pending", "approved", "rejected" or "expired"
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitVoteRequest {
    /// "approve" or "reject"
    pub decision: String,
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub id: String,
    pub group_id: String,
    pub cycle_number: i64,
    pub amount_btc: f64,
    /// RFC 3339
    pub due_date: String,
    /// "pending", "paid", "overdue" or "failed"
    pub status: String,
    /// RFC 3339, set once paid
    pub paid_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub payment_id: String,
    /// BOLT11 invoice string from the payment gateway
    pub invoice: String,
    /// RFC 3339 invoice expiry
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub payment_id: String,
    pub status: String,
    /// RFC 3339, present when the payment settled
    pub confirmed_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Payouts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutQueueEntry {
    /// 1-based position in the current cycle's rotation
    pub position: i64,
    pub user_id: String,
    pub member_name: String,
    pub trust_score: i64,
    pub has_defaulted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPayoutRequest {
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutEntry {
    pub id: String,
    pub group_id: String,
    pub cycle_number: i64,
    /// Pool minus the platform fee, in BTC
    pub amount_btc: f64,
    /// "pending", "processing", "paid" or "failed"
    pub status: String,
    pub mavapay_ref: Option<String>,
    pub trust_score_at_payout: i64,
    /// RFC 3339
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Trust score
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreResponse {
    pub score: i64,
    pub level: String,
    pub progress: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreSnapshot {
    /// RFC 3339
    pub date: String,
    pub score: i64,
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceCycleRequest {
    /// The cycle number the caller believes is current; guards against
    /// double-advancing on a stale read.
    pub expected_cycle_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvanceCycleResponse {
    pub group: GroupSummary,
    pub new_cycle: CycleEntry,
    /// Members who missed the closing cycle's contribution
    pub defaulted_members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub cycle_number: i64,
    /// RFC 3339
    pub start_date: String,
    /// RFC 3339
    pub end_date: String,
    pub payout_order: Vec<String>,
}
