use chrono::Utc;
use tracing::{info, warn};

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GroupMember, User};
use crate::domain::trust::{
    clamp_score, trust_level, trust_progress, DEFAULT_PENALTY, LATE_PENALTY, ON_TIME_REWARD,
    SCORE_MAX, SCORE_MIN,
};

/// Maintains each user's reputation score as a function of payment
/// timeliness. Score mutations are plain clamped arithmetic; every
/// mutation appends a `(date, score)` snapshot to the user's history.
#[derive(Clone)]
pub struct TrustService {
    db: DbConnection,
}

impl TrustService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Reward a contribution settled within its payment window.
    pub async fn apply_on_time_payment(&self, user_id: &str) -> DomainResult<i64> {
        let new_score = self.adjust(user_id, ON_TIME_REWARD).await?;
        info!("On-time payment for {}: score now {}", user_id, new_score);
        Ok(new_score)
    }

    /// Penalize a contribution settled after its due date.
    pub async fn apply_late_payment(&self, user_id: &str) -> DomainResult<i64> {
        let new_score = self.adjust(user_id, -LATE_PENALTY).await?;
        info!("Late payment for {}: score now {}", user_id, new_score);
        Ok(new_score)
    }

    /// Penalize a member who never settled a cycle's contribution. Marks
    /// the membership defaulted, which drops them to the back of the
    /// payout rotation from the next cycle on.
    pub async fn apply_default(&self, member: &GroupMember) -> DomainResult<i64> {
        let new_score = self.adjust(&member.user_id, -DEFAULT_PENALTY).await?;

        let mut member = member.clone();
        member.has_defaulted = true;
        member.updated_at = Utc::now();
        self.db.update_member(&member).await?;

        warn!(
            "Member {} defaulted in group {}: score now {}",
            member.user_id, member.group_id, new_score
        );
        Ok(new_score)
    }

    /// Current score plus its display classification.
    pub async fn score(&self, user_id: &str) -> DomainResult<(i64, &'static str, f64)> {
        let user = self.load_user(user_id).await?;
        Ok((
            user.trust_score,
            trust_level(user.trust_score).label(),
            trust_progress(user.trust_score),
        ))
    }

    /// The user's `(date, score)` snapshot series, oldest first.
    pub async fn history(
        &self,
        user_id: &str,
    ) -> DomainResult<Vec<(chrono::DateTime<Utc>, i64)>> {
        Ok(self.db.list_trust_snapshots(user_id).await?)
    }

    async fn adjust(&self, user_id: &str, delta: i64) -> DomainResult<i64> {
        let mut user = self.load_user(user_id).await?;

        // Clamping keeps this unreachable; a stored score outside the
        // range means some other writer bypassed the engine.
        if user.trust_score < SCORE_MIN || user.trust_score > SCORE_MAX {
            return Err(DomainError::InvalidScoreRange(user.trust_score));
        }

        let now = Utc::now();
        user.trust_score = clamp_score(user.trust_score + delta);
        user.updated_at = now;
        self.db.update_user(&user).await?;
        self.db
            .append_trust_snapshot(user_id, now, user.trust_score)
            .await?;

        Ok(user.trust_score)
    }

    async fn load_user(&self, user_id: &str) -> DomainResult<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(DomainError::NotFound("User"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MembershipStatus;
    use crate::domain::trust::STARTING_SCORE;

    async fn setup_test() -> (TrustService, DbConnection) {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        (TrustService::new(db.clone()), db)
    }

    async fn create_user(db: &DbConnection, score: i64) -> User {
        let now = Utc::now();
        let user = User {
            id: User::generate_id(),
            name: "Test User".to_string(),
            email: format!("{}@example.com", uuid::Uuid::new_v4()),
            mavapay_wallet_id: None,
            trust_score: score,
            created_at: now,
            updated_at: now,
        };
        db.create_user(&user).await.unwrap();
        user
    }

    async fn create_member(db: &DbConnection, user_id: &str) -> GroupMember {
        let now = Utc::now();
        let member = GroupMember {
            id: GroupMember::generate_id(),
            user_id: user_id.to_string(),
            group_id: "group::g".to_string(),
            status: MembershipStatus::Approved,
            join_date: Some(now),
            total_contributions: 0,
            has_defaulted: false,
            created_at: now,
            updated_at: now,
        };
        db.create_member(&member).await.unwrap();
        member
    }

    #[tokio::test]
    async fn test_on_time_payment_rewards() {
        let (service, db) = setup_test().await;
        let user = create_user(&db, 495).await;

        let new_score = service.apply_on_time_payment(&user.id).await.unwrap();
        assert_eq!(new_score, 500);
    }

    #[tokio::test]
    async fn test_on_time_payment_clamps_at_max() {
        let (service, db) = setup_test().await;
        let user = create_user(&db, 998).await;

        let new_score = service.apply_on_time_payment(&user.id).await.unwrap();
        assert_eq!(new_score, SCORE_MAX);
    }

    #[tokio::test]
    async fn test_late_payment_clamps_at_min() {
        let (service, db) = setup_test().await;
        let user = create_user(&db, 4).await;

        let new_score = service.apply_late_payment(&user.id).await.unwrap();
        assert_eq!(new_score, SCORE_MIN);
    }

    #[tokio::test]
    async fn test_default_marks_member_and_penalizes() {
        let (service, db) = setup_test().await;
        let user = create_user(&db, STARTING_SCORE).await;
        let member = create_member(&db, &user.id).await;

        let new_score = service.apply_default(&member).await.unwrap();
        assert_eq!(new_score, STARTING_SCORE - DEFAULT_PENALTY);

        let stored = db.get_member("group::g", &user.id).await.unwrap().unwrap();
        assert!(stored.has_defaulted);
    }

    #[tokio::test]
    async fn test_mutations_append_history() {
        let (service, db) = setup_test().await;
        let user = create_user(&db, STARTING_SCORE).await;

        service.apply_on_time_payment(&user.id).await.unwrap();
        service.apply_on_time_payment(&user.id).await.unwrap();
        service.apply_late_payment(&user.id).await.unwrap();

        let history = service.history(&user.id).await.unwrap();
        let scores: Vec<i64> = history.iter().map(|(_, s)| *s).collect();
        assert_eq!(scores, vec![505, 510, 500]);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let (service, _db) = setup_test().await;
        let result = service.apply_on_time_payment("user::missing").await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
