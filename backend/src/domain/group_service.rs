use chrono::{Duration, Utc};
use tracing::info;

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::GroupLocks;
use crate::domain::models::{
    Cycle, Frequency, Group, GroupMember, GroupStatus, MemberView, MembershipStatus, Payment,
    PaymentStatus, Vote, VoteStatus, PAYMENT_WINDOW_DAYS, REQUIRED_PERCENTAGE, VOTE_WINDOW_DAYS,
};

/// A group plus the bits of state list/detail screens need alongside it.
#[derive(Debug, Clone)]
pub struct GroupOverview {
    pub group: Group,
    pub approved_members: i64,
}

/// Full group detail: the group, every member row joined to its user,
/// and the current cycle.
#[derive(Debug, Clone)]
pub struct GroupDetailView {
    pub group: Group,
    pub members: Vec<MemberView>,
    pub current_cycle: Option<Cycle>,
}

/// Group lifecycle: creation, discovery, open/closed status and join
/// applications. Joining never admits directly; it opens a membership
/// vote that the existing members resolve.
#[derive(Clone)]
pub struct GroupService {
    db: DbConnection,
    locks: GroupLocks,
}

impl GroupService {
    pub fn new(db: DbConnection, locks: GroupLocks) -> Self {
        Self { db, locks }
    }

    /// Create a group with the caller as admin. The admin is admitted
    /// immediately (no vote), cycle 1 starts now, and the admin's first
    /// contribution comes due at the end of the payment window.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_group(
        &self,
        admin_id: &str,
        name: &str,
        description: Option<String>,
        contribution_amount_btc: f64,
        frequency: Frequency,
        duration_weeks: i64,
        member_cap: i64,
    ) -> DomainResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Group name cannot be empty"));
        }
        if contribution_amount_btc <= 0.0 {
            return Err(DomainError::validation(
                "Contribution amount must be positive",
            ));
        }
        if duration_weeks < 1 {
            return Err(DomainError::validation("Duration must be at least a week"));
        }
        if member_cap < 2 {
            return Err(DomainError::validation(
                "A group needs room for at least two members",
            ));
        }
        let admin = self
            .db
            .get_user(admin_id)
            .await?
            .ok_or(DomainError::NotFound("User"))?;

        let now = Utc::now();
        let group = Group {
            id: Group::generate_id(),
            name: name.to_string(),
            description,
            admin_id: admin.id.clone(),
            contribution_amount_btc,
            frequency,
            duration_weeks,
            member_cap,
            is_open: true,
            status: GroupStatus::Active,
            current_cycle_number: 1,
            created_at: now,
            updated_at: now,
        };
        self.db.create_group(&group).await?;

        let member = GroupMember {
            id: GroupMember::generate_id(),
            user_id: admin.id.clone(),
            group_id: group.id.clone(),
            status: MembershipStatus::Approved,
            join_date: Some(now),
            total_contributions: 0,
            has_defaulted: false,
            created_at: now,
            updated_at: now,
        };
        self.db.create_member(&member).await?;

        let cycle = Cycle {
            id: Cycle::generate_id(),
            group_id: group.id.clone(),
            cycle_number: 1,
            start_date: now,
            end_date: now + Duration::weeks(frequency.cycle_length_weeks()),
            payout_order: vec![admin.id.clone()],
        };
        self.db.create_cycle(&cycle).await?;

        let payment = Payment {
            id: Payment::generate_id(),
            user_id: admin.id.clone(),
            group_id: group.id.clone(),
            cycle_number: 1,
            amount_btc: contribution_amount_btc,
            lightning_invoice: None,
            status: PaymentStatus::Pending,
            due_date: now + Duration::days(PAYMENT_WINDOW_DAYS),
            paid_at: None,
            created_at: now,
        };
        self.db.create_payment(&payment).await?;

        info!("Created group {} ({}) by {}", group.id, group.name, admin.id);
        Ok(group)
    }

    /// Open groups, newest first, with their approved-member counts.
    /// Returns the page plus the total open-group count for pagination.
    pub async fn list_open(&self, page: i64, limit: i64) -> DomainResult<(Vec<GroupOverview>, i64)> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let groups = self.db.list_open_groups(limit, offset).await?;
        let total = self.db.count_open_groups().await?;

        let mut overviews = Vec::with_capacity(groups.len());
        for group in groups {
            let approved_members = self.db.count_approved_members(&group.id).await?;
            overviews.push(GroupOverview { group, approved_members });
        }
        Ok((overviews, total))
    }

    pub async fn get_detail(&self, group_id: &str) -> DomainResult<GroupDetailView> {
        let group = self.load_group(group_id).await?;
        let members = self.db.list_member_views(group_id).await?;
        let current_cycle = self.db.get_cycle(group_id, group.current_cycle_number).await?;
        Ok(GroupDetailView { group, members, current_cycle })
    }

    /// Toggle whether the group accepts join applications. Admin only.
    pub async fn set_open(&self, group_id: &str, caller_id: &str, open: bool) -> DomainResult<Group> {
        let mut group = self.load_group(group_id).await?;
        if group.admin_id != caller_id {
            return Err(DomainError::NotGroupAdmin);
        }

        group.is_open = open;
        group.updated_at = Utc::now();
        self.db.update_group(&group).await?;

        info!("Group {} is now {}", group.id, if open { "open" } else { "closed" });
        Ok(group)
    }

    /// Apply to join a group. Creates a Pending membership and a vote
    /// whose voter snapshot is the approved-member count at this moment.
    ///
    /// Rejected or suspended members may re-apply; their old row is reset
    /// to Pending rather than duplicated.
    pub async fn join_group(&self, group_id: &str, user_id: &str) -> DomainResult<Vote> {
        let lock = self.locks.for_group(group_id);
        let _guard = lock.lock().await;

        let group = self.load_group(group_id).await?;
        if !group.is_open || group.status != GroupStatus::Active {
            return Err(DomainError::GroupClosed);
        }
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or(DomainError::NotFound("User"))?;

        let approved = self.db.count_approved_members(group_id).await?;
        if approved >= group.member_cap {
            return Err(DomainError::GroupFull);
        }

        let now = Utc::now();
        match self.db.get_member(group_id, &user.id).await? {
            Some(member)
                if matches!(
                    member.status,
                    MembershipStatus::Approved | MembershipStatus::Pending
                ) =>
            {
                return Err(DomainError::AlreadyMember);
            }
            Some(mut member) => {
                member.status = MembershipStatus::Pending;
                member.join_date = None;
                member.has_defaulted = false;
                member.updated_at = now;
                self.db.update_member(&member).await?;
            }
            None => {
                let member = GroupMember {
                    id: GroupMember::generate_id(),
                    user_id: user.id.clone(),
                    group_id: group.id.clone(),
                    status: MembershipStatus::Pending,
                    join_date: None,
                    total_contributions: 0,
                    has_defaulted: false,
                    created_at: now,
                    updated_at: now,
                };
                self.db.create_member(&member).await?;
            }
        }

        let vote = Vote {
            id: Vote::generate_id(),
            group_id: group.id.clone(),
            applicant_id: user.id.clone(),
            approvals: 0,
            rejections: 0,
            total_voters: approved,
            required_percentage: REQUIRED_PERCENTAGE,
            deadline: now + Duration::days(VOTE_WINDOW_DAYS),
            status: VoteStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.db.create_vote(&vote).await?;

        info!(
            "User {} applied to group {}; vote {} open until {}",
            user.id, group.id, vote.id, vote.deadline
        );
        Ok(vote)
    }

    async fn load_group(&self, group_id: &str) -> DomainResult<Group> {
        self.db
            .get_group(group_id)
            .await?
            .ok_or(DomainError::NotFound("Group"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::STARTING_SCORE;
    use crate::domain::models::User;

    async fn setup_test() -> (GroupService, DbConnection) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (GroupService::new(db.clone(), GroupLocks::new()), db)
    }

    async fn create_user(db: &DbConnection, name: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: User::generate_id(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            mavapay_wallet_id: None,
            trust_score: STARTING_SCORE,
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).await.unwrap();
        user
    }

    async fn create_group(service: &GroupService, admin: &User) -> Group {
        service
            .create_group(
                &admin.id,
                "Lagos Savers",
                Some("Weekly circle".to_string()),
                0.001,
                Frequency::Weekly,
                12,
                5,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_group_admits_admin_and_opens_cycle_one() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;

        assert_eq!(group.current_cycle_number, 1);
        assert!(group.is_open);

        let member = db.get_member(&group.id, &admin.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Approved);
        assert!(member.join_date.is_some());

        let cycle = db.get_cycle(&group.id, 1).await.unwrap().unwrap();
        assert_eq!(cycle.payout_order, vec![admin.id.clone()]);

        let payments = db.list_payments_for_user(&admin.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_group_validates_input() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;

        let result = service
            .create_group(&admin.id, "", None, 0.001, Frequency::Weekly, 12, 5)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        let result = service
            .create_group(&admin.id, "G", None, 0.0, Frequency::Weekly, 12, 5)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        let result = service
            .create_group(&admin.id, "G", None, 0.001, Frequency::Weekly, 12, 1)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_join_creates_pending_member_and_vote() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;
        let applicant = create_user(&db, "applicant").await;

        let vote = service.join_group(&group.id, &applicant.id).await.unwrap();
        assert_eq!(vote.total_voters, 1); // just the admin so far
        assert_eq!(vote.status, VoteStatus::Pending);
        assert_eq!(vote.required_percentage, REQUIRED_PERCENTAGE);

        let member = db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Pending);
        assert!(member.join_date.is_none());
    }

    #[tokio::test]
    async fn test_join_twice_rejected() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;
        let applicant = create_user(&db, "applicant").await;

        service.join_group(&group.id, &applicant.id).await.unwrap();
        let result = service.join_group(&group.id, &applicant.id).await;
        assert!(matches!(result, Err(DomainError::AlreadyMember)));

        let result = service.join_group(&group.id, &admin.id).await;
        assert!(matches!(result, Err(DomainError::AlreadyMember)));
    }

    #[tokio::test]
    async fn test_rejected_member_may_reapply() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;
        let applicant = create_user(&db, "applicant").await;

        service.join_group(&group.id, &applicant.id).await.unwrap();
        let mut member = db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        member.status = MembershipStatus::Rejected;
        db.update_member(&member).await.unwrap();

        let vote = service.join_group(&group.id, &applicant.id).await.unwrap();
        assert_eq!(vote.status, VoteStatus::Pending);
        let member = db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Pending);
    }

    #[tokio::test]
    async fn test_join_closed_group_rejected() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;
        service.set_open(&group.id, &admin.id, false).await.unwrap();

        let applicant = create_user(&db, "applicant").await;
        let result = service.join_group(&group.id, &applicant.id).await;
        assert!(matches!(result, Err(DomainError::GroupClosed)));
    }

    #[tokio::test]
    async fn test_join_full_group_rejected() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = service
            .create_group(&admin.id, "Tiny", None, 0.001, Frequency::Weekly, 4, 2)
            .await
            .unwrap();

        // Fill the second and final slot directly.
        let filler = create_user(&db, "filler").await;
        let now = Utc::now();
        db.create_member(&GroupMember {
            id: GroupMember::generate_id(),
            user_id: filler.id.clone(),
            group_id: group.id.clone(),
            status: MembershipStatus::Approved,
            join_date: Some(now),
            total_contributions: 0,
            has_defaulted: false,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        let applicant = create_user(&db, "applicant").await;
        let result = service.join_group(&group.id, &applicant.id).await;
        assert!(matches!(result, Err(DomainError::GroupFull)));
    }

    #[tokio::test]
    async fn test_set_open_requires_admin() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        let group = create_group(&service, &admin).await;
        let outsider = create_user(&db, "outsider").await;

        let result = service.set_open(&group.id, &outsider.id, false).await;
        assert!(matches!(result, Err(DomainError::NotGroupAdmin)));
    }

    #[tokio::test]
    async fn test_list_open_paginates() {
        let (service, db) = setup_test().await;
        let admin = create_user(&db, "admin").await;
        for i in 0..3 {
            service
                .create_group(
                    &admin.id,
                    &format!("Group {}", i),
                    None,
                    0.001,
                    Frequency::Weekly,
                    4,
                    5,
                )
                .await
                .unwrap();
        }

        let (page, total) = service.list_open(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
        assert_eq!(page[0].approved_members, 1);

        let (page, _) = service.list_open(2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
    }
}
