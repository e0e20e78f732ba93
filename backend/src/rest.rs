use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared::{
    AdvanceCycleRequest, AdvanceCycleResponse, ApiResponse, CreateGroupRequest,
    CreateInvoiceRequest, CycleEntry, GroupDetail, GroupListResponse, GroupMemberEntry,
    GroupSummary, InvoiceResponse, LinkWalletRequest, PaginationInfo, PaymentEntry, PayoutEntry,
    PayoutQueueEntry, RegisterUserRequest, RequestPayoutRequest, SetGroupStatusRequest,
    SubmitVoteRequest, TrustScoreResponse, TrustScoreSnapshot, UserProfile, VerifyPaymentRequest,
    VerifyPaymentResponse, VoteApplicationEntry,
};
use tracing::info;

use crate::db::DbConnection;
use crate::domain::models::{
    Cycle, Frequency, Group, MemberView, Payment, Payout, User, Vote, VoteDecision,
};
use crate::domain::settlement::{MockLightningGateway, MockMavapayGateway};
use crate::domain::trust::{trust_level, trust_progress};
use crate::domain::{
    CycleService, DomainError, GroupLocks, GroupService, PaymentService, PayoutService,
    TrustService, UserService, VoteService,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub groups: GroupService,
    pub votes: VoteService,
    pub cycles: CycleService,
    pub payments: PaymentService<MockLightningGateway>,
    pub payouts: PayoutService<MockMavapayGateway>,
    pub trust: TrustService,
}

impl AppState {
    /// Wire every service over one database connection and one set of
    /// per-group locks.
    pub fn new(db: DbConnection) -> Self {
        let locks = GroupLocks::new();
        let trust = TrustService::new(db.clone());
        Self {
            users: UserService::new(db.clone()),
            groups: GroupService::new(db.clone(), locks.clone()),
            votes: VoteService::new(db.clone(), locks.clone()),
            cycles: CycleService::new(db.clone(), locks.clone(), trust.clone()),
            payments: PaymentService::new(db.clone(), MockLightningGateway, trust.clone()),
            payouts: PayoutService::new(db, locks, MockMavapayGateway),
            trust,
        }
    }
}

/// Identity comes from the upstream auth proxy as an `x-user-id` header.
fn caller_id(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::err("Missing x-user-id header")),
            )
                .into_response()
        })
}

fn error_response(e: DomainError) -> Response {
    let status = match &e {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::NotGroupAdmin
        | DomainError::NotGroupMember
        | DomainError::OutOfTurn
        | DomainError::WalletNotLinked => StatusCode::FORBIDDEN,
        DomainError::StaleCycle => StatusCode::CONFLICT,
        DomainError::Storage(inner) => {
            tracing::error!("Storage error: {:?}", inner);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("Internal server error")),
            )
                .into_response();
        }
        _ => StatusCode::BAD_REQUEST,
    };
    (status, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
}

// ---------------------------------------------------------------------
// DTO conversion
// ---------------------------------------------------------------------

fn to_profile(user: &User) -> UserProfile {
    UserProfile {
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        trust_score: user.trust_score,
        trust_level: trust_level(user.trust_score).label().to_string(),
        trust_progress: trust_progress(user.trust_score),
        mavapay_linked: user.mavapay_wallet_id.is_some(),
        mavapay_wallet_id: user.mavapay_wallet_id.clone(),
    }
}

fn to_group_summary(group: &Group, members_count: i64) -> GroupSummary {
    GroupSummary {
        id: group.id.clone(),
        name: group.name.clone(),
        description: group.description.clone(),
        admin_id: group.admin_id.clone(),
        contribution_amount_btc: group.contribution_amount_btc,
        frequency: group.frequency.to_string(),
        duration_weeks: group.duration_weeks,
        member_cap: group.member_cap,
        members_count,
        is_open: group.is_open,
        status: group.status.to_string(),
        current_cycle_number: group.current_cycle_number,
        total_cycles: group.total_cycles(),
        created_at: group.created_at.to_rfc3339(),
    }
}

fn to_member_entry(view: &MemberView) -> GroupMemberEntry {
    GroupMemberEntry {
        user_id: view.member.user_id.clone(),
        name: view.name.clone(),
        status: view.member.status.to_string(),
        trust_score: view.trust_score,
        total_contributions: view.member.total_contributions,
        has_defaulted: view.member.has_defaulted,
        join_date: view.member.join_date.map(|d| d.to_rfc3339()),
    }
}

fn to_vote_entry(vote: &Vote, applicant: &User) -> VoteApplicationEntry {
    VoteApplicationEntry {
        id: vote.id.clone(),
        group_id: vote.group_id.clone(),
        applicant_id: vote.applicant_id.clone(),
        applicant_name: applicant.name.clone(),
        applicant_trust_score: applicant.trust_score,
        approvals: vote.approvals,
        rejections: vote.rejections,
        total_voters: vote.total_voters,
        required_percentage: vote.required_percentage,
        deadline: vote.deadline.to_rfc3339(),
        status: vote.status.to_string(),
    }
}

fn to_payment_entry(payment: &Payment) -> PaymentEntry {
    PaymentEntry {
        id: payment.id.clone(),
        group_id: payment.group_id.clone(),
        cycle_number: payment.cycle_number,
        amount_btc: payment.amount_btc,
        due_date: payment.due_date.to_rfc3339(),
        status: payment.status.to_string(),
        paid_at: payment.paid_at.map(|d| d.to_rfc3339()),
    }
}

fn to_payout_entry(payout: &Payout) -> PayoutEntry {
    PayoutEntry {
        id: payout.id.clone(),
        group_id: payout.group_id.clone(),
        cycle_number: payout.cycle_number,
        amount_btc: payout.amount_btc,
        status: payout.status.to_string(),
        mavapay_ref: payout.mavapay_ref.clone(),
        trust_score_at_payout: payout.trust_score_at_payout,
        created_at: payout.created_at.to_rfc3339(),
    }
}

fn to_cycle_entry(cycle: &Cycle) -> CycleEntry {
    CycleEntry {
        cycle_number: cycle.cycle_number,
        start_date: cycle.start_date.to_rfc3339(),
        end_date: cycle.end_date.to_rfc3339(),
        payout_order: cycle.payout_order.clone(),
    }
}

// ---------------------------------------------------------------------
// Users and auth
// ---------------------------------------------------------------------

/// Axum handler for POST /api/users
pub async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> impl IntoResponse {
    info!("POST /api/users - email: {}", request.email);

    match state.users.register(&request.name, &request.email).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("User registered", to_profile(&user))),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Axum handler for GET /api/auth/me
pub async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.users.profile(&user_id).await {
        Ok(user) => Json(ApiResponse::ok("OK", to_profile(&user))).into_response(),
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/auth/link-mavapay
pub async fn link_mavapay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LinkWalletRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/auth/link-mavapay - user: {}", user_id);

    match state.users.link_wallet(&user_id, &request.wallet_id).await {
        Ok(user) => Json(ApiResponse::ok("Wallet linked", to_profile(&user))).into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Trust score
// ---------------------------------------------------------------------

/// Axum handler for GET /api/trust/score
pub async fn get_trust_score(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.trust.score(&user_id).await {
        Ok((score, level, progress)) => Json(ApiResponse::ok(
            "OK",
            TrustScoreResponse { score, level: level.to_string(), progress },
        ))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Axum handler for GET /api/trust/history
pub async fn get_trust_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.trust.history(&user_id).await {
        Ok(history) => {
            let snapshots: Vec<TrustScoreSnapshot> = history
                .iter()
                .map(|(date, score)| TrustScoreSnapshot {
                    date: date.to_rfc3339(),
                    score: *score,
                })
                .collect();
            Json(ApiResponse::ok("OK", snapshots)).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------

/// Query parameters for the open-group listing
#[derive(Deserialize, Debug)]
pub struct GroupListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Axum handler for GET /api/groups
pub async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupListQuery>,
) -> impl IntoResponse {
    info!("GET /api/groups - query: {:?}", query);
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    match state.groups.list_open(page, limit).await {
        Ok((overviews, total)) => {
            let groups = overviews
                .iter()
                .map(|o| to_group_summary(&o.group, o.approved_members))
                .collect();
            let response = GroupListResponse {
                groups,
                pagination: PaginationInfo {
                    page,
                    limit,
                    total,
                    pages: (total + limit - 1) / limit,
                },
            };
            Json(ApiResponse::ok("OK", response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/groups - name: {} by {}", request.name, user_id);

    let frequency = match Frequency::from_string(&request.frequency) {
        Ok(f) => f,
        Err(e) => return error_response(DomainError::validation(e)),
    };

    let result = state
        .groups
        .create_group(
            &user_id,
            &request.name,
            request.description,
            request.contribution_amount_btc,
            frequency,
            request.duration_weeks,
            request.member_cap,
        )
        .await;
    match result {
        Ok(group) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("Group created", to_group_summary(&group, 1))),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Axum handler for GET /api/groups/:id
pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> impl IntoResponse {
    match state.groups.get_detail(&group_id).await {
        Ok(detail) => {
            let approved = detail
                .members
                .iter()
                .filter(|m| {
                    m.member.status == crate::domain::models::MembershipStatus::Approved
                })
                .count() as i64;
            let response = GroupDetail {
                group: to_group_summary(&detail.group, approved),
                members: detail.members.iter().map(to_member_entry).collect(),
                payout_order: detail
                    .current_cycle
                    .map(|c| c.payout_order)
                    .unwrap_or_default(),
            };
            Json(ApiResponse::ok("OK", response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/groups/:id/join
pub async fn join_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/groups/{}/join - user: {}", group_id, user_id);

    match state.groups.join_group(&group_id, &user_id).await {
        Ok(vote) => {
            let applicant = match state.users.profile(&vote.applicant_id).await {
                Ok(user) => user,
                Err(e) => return error_response(e),
            };
            (
                StatusCode::CREATED,
                Json(ApiResponse::ok(
                    "Application submitted; membership vote opened",
                    to_vote_entry(&vote, &applicant),
                )),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for PUT /api/groups/:id/status
pub async fn set_group_status(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SetGroupStatusRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!(
        "PUT /api/groups/{}/status - open: {} by {}",
        group_id, request.is_open, user_id
    );

    match state.groups.set_open(&group_id, &user_id, request.is_open).await {
        Ok(group) => {
            Json(ApiResponse::ok("Group status updated", to_group_summary(&group, 0)))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/groups/:id/advance
pub async fn advance_cycle(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AdvanceCycleRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!(
        "POST /api/groups/{}/advance - expected cycle {} by {}",
        group_id, request.expected_cycle_number, user_id
    );

    let result = state
        .cycles
        .advance_cycle(&group_id, &user_id, request.expected_cycle_number)
        .await;
    match result {
        Ok(advance) => {
            let response = AdvanceCycleResponse {
                group: to_group_summary(&advance.group, 0),
                new_cycle: to_cycle_entry(&advance.new_cycle),
                defaulted_members: advance.defaulted_members,
            };
            Json(ApiResponse::ok("Cycle advanced", response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Membership votes
// ---------------------------------------------------------------------

/// Axum handler for GET /api/votes
pub async fn list_votes(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let votes = match state.votes.list_for_voter(&user_id).await {
        Ok(votes) => votes,
        Err(e) => return error_response(e),
    };

    let mut entries = Vec::with_capacity(votes.len());
    for vote in &votes {
        match state.users.profile(&vote.applicant_id).await {
            Ok(applicant) => entries.push(to_vote_entry(vote, &applicant)),
            Err(e) => return error_response(e),
        }
    }
    Json(ApiResponse::ok("OK", entries)).into_response()
}

/// Axum handler for POST /api/votes/:id
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(vote_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SubmitVoteRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/votes/{} - {} by {}", vote_id, request.decision, user_id);

    let decision = match VoteDecision::from_string(&request.decision) {
        Ok(d) => d,
        Err(e) => return error_response(DomainError::validation(e)),
    };

    match state.votes.cast_ballot(&vote_id, &user_id, decision).await {
        Ok(vote) => vote_response(&state, vote).await,
        Err(e) => error_response(e),
    }
}

/// Axum handler for PUT /api/votes/:id
pub async fn edit_vote(
    State(state): State<AppState>,
    Path(vote_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<SubmitVoteRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("PUT /api/votes/{} - {} by {}", vote_id, request.decision, user_id);

    let decision = match VoteDecision::from_string(&request.decision) {
        Ok(d) => d,
        Err(e) => return error_response(DomainError::validation(e)),
    };

    match state.votes.edit_ballot(&vote_id, &user_id, decision).await {
        Ok(vote) => vote_response(&state, vote).await,
        Err(e) => error_response(e),
    }
}

async fn vote_response(state: &AppState, vote: Vote) -> Response {
    match state.users.profile(&vote.applicant_id).await {
        Ok(applicant) => {
            Json(ApiResponse::ok("Ballot recorded", to_vote_entry(&vote, &applicant)))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------

/// Axum handler for GET /api/payments
pub async fn list_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.payments.list_for_user(&user_id).await {
        Ok(payments) => {
            let entries: Vec<PaymentEntry> = payments.iter().map(to_payment_entry).collect();
            Json(ApiResponse::ok("OK", entries)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/payments/invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateInvoiceRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/payments/invoice - payment: {}", request.payment_id);

    match state.payments.create_invoice(&request.payment_id, &user_id).await {
        Ok((payment, expires_at)) => {
            let response = InvoiceResponse {
                payment_id: payment.id.clone(),
                invoice: payment.lightning_invoice.clone().unwrap_or_default(),
                expires_at: expires_at.to_rfc3339(),
            };
            (StatusCode::CREATED, Json(ApiResponse::ok("Invoice created", response)))
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/payments/verify
pub async fn verify_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyPaymentRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/payments/verify - payment: {}", request.payment_id);

    match state.payments.verify_payment(&request.payment_id, &user_id).await {
        Ok(receipt) => {
            let response = VerifyPaymentResponse {
                payment_id: receipt.payment.id.clone(),
                status: receipt.payment.status.to_string(),
                confirmed_at: receipt.payment.paid_at.map(|d| d.to_rfc3339()),
            };
            let message = if receipt.on_time {
                "Contribution settled on time"
            } else {
                "Contribution settled late"
            };
            Json(ApiResponse::ok(message, response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Payouts
// ---------------------------------------------------------------------

/// Axum handler for GET /api/payouts
pub async fn list_payouts(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.payouts.list_for_user(&user_id).await {
        Ok(payouts) => {
            let entries: Vec<PayoutEntry> = payouts.iter().map(to_payout_entry).collect();
            Json(ApiResponse::ok("OK", entries)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Query parameters for the payout queue endpoint
#[derive(Deserialize, Debug)]
pub struct PayoutQueueQuery {
    pub group_id: String,
}

/// Axum handler for GET /api/payouts/queue
pub async fn payout_queue(
    State(state): State<AppState>,
    Query(query): Query<PayoutQueueQuery>,
) -> impl IntoResponse {
    info!("GET /api/payouts/queue - group: {}", query.group_id);

    match state.payouts.queue(&query.group_id).await {
        Ok(slots) => {
            let entries: Vec<PayoutQueueEntry> = slots
                .iter()
                .map(|slot| PayoutQueueEntry {
                    position: slot.position as i64,
                    user_id: slot.view.member.user_id.clone(),
                    member_name: slot.view.name.clone(),
                    trust_score: slot.view.trust_score,
                    has_defaulted: slot.view.member.has_defaulted,
                })
                .collect();
            Json(ApiResponse::ok("OK", entries)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Axum handler for POST /api/payouts/request
pub async fn request_payout(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RequestPayoutRequest>,
) -> impl IntoResponse {
    let user_id = match caller_id(&headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    info!("POST /api/payouts/request - group: {} by {}", request.group_id, user_id);

    match state.payouts.request_payout(&request.group_id, &user_id).await {
        Ok(payout) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok("Payout processed", to_payout_entry(&payout))),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------

/// Axum handler for GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("OK", "healthy"))
}
