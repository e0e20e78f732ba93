use chrono::Utc;
use tracing::info;

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::User;
use crate::domain::trust::STARTING_SCORE;

/// Registration, profile lookup and wallet linking.
#[derive(Clone)]
pub struct UserService {
    db: DbConnection,
}

impl UserService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Register a new user at the starting trust score. The starting
    /// score is also the first point of the user's score history.
    pub async fn register(&self, name: &str, email: &str) -> DomainResult<User> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() {
            return Err(DomainError::validation("Name cannot be empty"));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("A valid email is required"));
        }

        let now = Utc::now();
        let user = User {
            id: User::generate_id(),
            name: name.to_string(),
            email: email.to_string(),
            mavapay_wallet_id: None,
            trust_score: STARTING_SCORE,
            created_at: now,
            updated_at: now,
        };
        self.db.create_user(&user).await?;
        self.db
            .append_trust_snapshot(&user.id, now, STARTING_SCORE)
            .await?;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn profile(&self, user_id: &str) -> DomainResult<User> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(DomainError::NotFound("User"))
    }

    /// Attach a settlement wallet to the account. Payouts are refused
    /// until this has happened.
    pub async fn link_wallet(&self, user_id: &str, wallet_id: &str) -> DomainResult<User> {
        let wallet_id = wallet_id.trim();
        if wallet_id.is_empty() {
            return Err(DomainError::validation("Wallet id cannot be empty"));
        }

        let mut user = self.profile(user_id).await?;
        user.mavapay_wallet_id = Some(wallet_id.to_string());
        user.updated_at = Utc::now();
        self.db.update_user(&user).await?;

        info!("Linked wallet for user {}", user.id);
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test() -> UserService {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        UserService::new(db)
    }

    #[tokio::test]
    async fn test_register_starts_at_starting_score() {
        let service = setup_test().await;
        let user = service.register("Amina", "amina@example.com").await.unwrap();

        assert_eq!(user.trust_score, STARTING_SCORE);
        assert!(user.mavapay_wallet_id.is_none());
        assert!(user.id.starts_with("user::"));
    }

    #[tokio::test]
    async fn test_register_seeds_score_history() {
        let service = setup_test().await;
        let user = service.register("Amina", "amina@example.com").await.unwrap();

        let history = service.db.list_trust_snapshots(&user.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1, STARTING_SCORE);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let service = setup_test().await;
        assert!(matches!(
            service.register("", "a@example.com").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.register("Amina", "not-an-email").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_link_wallet() {
        let service = setup_test().await;
        let user = service.register("Amina", "amina@example.com").await.unwrap();

        let updated = service.link_wallet(&user.id, "wallet-123").await.unwrap();
        assert_eq!(updated.mavapay_wallet_id.as_deref(), Some("wallet-123"));
    }

    #[tokio::test]
    async fn test_link_wallet_unknown_user() {
        let service = setup_test().await;
        let result = service.link_wallet("user::missing", "wallet-123").await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }
}
