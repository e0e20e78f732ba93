use chrono::Utc;
use tracing::{info, warn};

use crate::db::DbConnection;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::locks::GroupLocks;
use crate::domain::models::{
    MembershipStatus, Vote, VoteBallot, VoteDecision, VoteStatus,
};

/// Membership vote state machine.
///
/// A vote approves as soon as 60% of the snapshotted voter set approves,
/// rejects as soon as that threshold becomes unreachable, and expires if
/// the deadline passes first. Each terminal transition also moves the
/// applicant's membership row.
#[derive(Clone)]
pub struct VoteService {
    db: DbConnection,
    locks: GroupLocks,
}

impl VoteService {
    pub fn new(db: DbConnection, locks: GroupLocks) -> Self {
        Self { db, locks }
    }

    /// Votes visible to a user: every vote in groups where they are an
    /// approved member.
    pub async fn list_for_voter(&self, voter_id: &str) -> DomainResult<Vec<Vote>> {
        Ok(self.db.list_votes_for_voter(voter_id).await?)
    }

    /// Cast a ballot. One ballot per voter per vote; use [`edit_ballot`]
    /// to change a decision before the deadline.
    ///
    /// [`edit_ballot`]: VoteService::edit_ballot
    pub async fn cast_ballot(
        &self,
        vote_id: &str,
        voter_id: &str,
        decision: VoteDecision,
    ) -> DomainResult<Vote> {
        let vote = self.load_vote(vote_id).await?;
        let lock = self.locks.for_group(&vote.group_id);
        let _guard = lock.lock().await;

        // Reload under the lock; another ballot may have landed first.
        let mut vote = self.load_vote(vote_id).await?;
        self.check_open(&vote, voter_id).await?;

        if self.db.get_ballot(vote_id, voter_id).await?.is_some() {
            return Err(DomainError::DuplicateVote);
        }

        let now = Utc::now();
        self.db
            .create_ballot(&VoteBallot {
                vote_id: vote.id.clone(),
                voter_id: voter_id.to_string(),
                decision,
                cast_at: now,
            })
            .await?;

        match decision {
            VoteDecision::Approve => vote.approvals += 1,
            VoteDecision::Reject => vote.rejections += 1,
        }
        vote.updated_at = now;

        self.settle(vote).await
    }

    /// Change an existing ballot before the deadline. The old decision is
    /// retracted from the tally and the new one applied.
    pub async fn edit_ballot(
        &self,
        vote_id: &str,
        voter_id: &str,
        decision: VoteDecision,
    ) -> DomainResult<Vote> {
        let vote = self.load_vote(vote_id).await?;
        let lock = self.locks.for_group(&vote.group_id);
        let _guard = lock.lock().await;

        let mut vote = self.load_vote(vote_id).await?;
        self.check_open(&vote, voter_id).await?;

        let mut ballot = self
            .db
            .get_ballot(vote_id, voter_id)
            .await?
            .ok_or(DomainError::NotFound("Ballot"))?;
        if ballot.decision == decision {
            return Ok(vote);
        }

        match ballot.decision {
            VoteDecision::Approve => vote.approvals -= 1,
            VoteDecision::Reject => vote.rejections -= 1,
        }
        match decision {
            VoteDecision::Approve => vote.approvals += 1,
            VoteDecision::Reject => vote.rejections += 1,
        }

        let now = Utc::now();
        ballot.decision = decision;
        ballot.cast_at = now;
        self.db.update_ballot(&ballot).await?;
        vote.updated_at = now;

        self.settle(vote).await
    }

    /// Expire every pending vote whose deadline has passed. Expired
    /// applications reject the applicant's membership row. Returns the
    /// number of votes expired.
    pub async fn expire_due(&self) -> DomainResult<usize> {
        let due = self.db.list_votes_past_deadline(Utc::now()).await?;
        let count = due.len();
        for mut vote in due {
            let lock = self.locks.for_group(&vote.group_id);
            let _guard = lock.lock().await;

            vote.status = VoteStatus::Expired;
            vote.updated_at = Utc::now();
            self.db.update_vote(&vote).await?;
            self.move_applicant(&vote, MembershipStatus::Rejected).await?;
            info!("Vote {} expired unresolved", vote.id);
        }
        Ok(count)
    }

    /// Guards common to casting and editing.
    async fn check_open(&self, vote: &Vote, voter_id: &str) -> DomainResult<()> {
        if vote.status.is_terminal() {
            return Err(DomainError::VoteClosed);
        }
        if Utc::now() > vote.deadline {
            return Err(DomainError::DeadlinePassed);
        }
        let voter = self.db.get_member(&vote.group_id, voter_id).await?;
        match voter {
            Some(m) if m.status == MembershipStatus::Approved => Ok(()),
            _ => Err(DomainError::NotGroupMember),
        }
    }

    /// Persist the tally and apply any terminal transition it implies.
    async fn settle(&self, mut vote: Vote) -> DomainResult<Vote> {
        let resolved = vote.resolve();
        if resolved == vote.status || !resolved.is_terminal() {
            self.db.update_vote(&vote).await?;
            return Ok(vote);
        }

        vote.status = resolved;
        match resolved {
            VoteStatus::Approved => {
                // The cap was checked when the application opened, but
                // several votes can run at once; a passed vote against a
                // group that filled up meanwhile resolves to Rejected.
                match self.admit_applicant(&vote).await {
                    Ok(()) => info!(
                        "Vote {} approved {} into group {} ({:.0}%)",
                        vote.id,
                        vote.applicant_id,
                        vote.group_id,
                        vote.percent_approved()
                    ),
                    Err(DomainError::GroupFull) => {
                        vote.status = VoteStatus::Rejected;
                        self.move_applicant(&vote, MembershipStatus::Rejected).await?;
                    }
                    Err(e) => return Err(e),
                }
            }
            VoteStatus::Rejected => {
                self.move_applicant(&vote, MembershipStatus::Rejected).await?;
                info!(
                    "Vote {} rejected {} from group {}",
                    vote.id, vote.applicant_id, vote.group_id
                );
            }
            _ => {}
        }
        self.db.update_vote(&vote).await?;
        Ok(vote)
    }

    async fn admit_applicant(&self, vote: &Vote) -> DomainResult<()> {
        let group = self
            .db
            .get_group(&vote.group_id)
            .await?
            .ok_or(DomainError::NotFound("Group"))?;
        let approved = self.db.count_approved_members(&vote.group_id).await?;
        if approved >= group.member_cap {
            warn!(
                "Vote {} passed but group {} filled up meanwhile; rejecting applicant",
                vote.id, vote.group_id
            );
            return Err(DomainError::GroupFull);
        }

        let mut member = self
            .db
            .get_member(&vote.group_id, &vote.applicant_id)
            .await?
            .ok_or(DomainError::NotFound("Member"))?;
        member.status = MembershipStatus::Approved;
        member.join_date = Some(Utc::now());
        member.updated_at = Utc::now();
        self.db.update_member(&member).await?;
        Ok(())
    }

    async fn move_applicant(&self, vote: &Vote, status: MembershipStatus) -> DomainResult<()> {
        let mut member = self
            .db
            .get_member(&vote.group_id, &vote.applicant_id)
            .await?
            .ok_or(DomainError::NotFound("Member"))?;
        member.status = status;
        member.updated_at = Utc::now();
        self.db.update_member(&member).await?;
        Ok(())
    }

    async fn load_vote(&self, vote_id: &str) -> DomainResult<Vote> {
        self.db
            .get_vote(vote_id)
            .await?
            .ok_or(DomainError::NotFound("Vote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group_service::GroupService;
    use crate::domain::models::{Frequency, Group, User};
    use crate::domain::trust::STARTING_SCORE;
    use chrono::Duration;

    struct Fixture {
        votes: VoteService,
        groups: GroupService,
        db: DbConnection,
    }

    async fn setup_test() -> Fixture {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        let locks = GroupLocks::new();
        Fixture {
            votes: VoteService::new(db.clone(), locks.clone()),
            groups: GroupService::new(db.clone(), locks),
            db,
        }
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

    /// Group with `voters` approved members (the admin plus extras).
    async fn group_with_voters(fx: &Fixture, voters: usize) -> (Group, Vec<User>) {
        let admin = create_user(&fx.db, "admin").await;
        let group = fx
            .groups
            .create_group(&admin.id, "Circle", None, 0.001, Frequency::Weekly, 12, 20)
            .await
            .unwrap();

        let mut members = vec![admin];
        for i in 1..voters {
            let user = create_user(&fx.db, &format!("member{}", i)).await;
            let now = Utc::now();
            fx.db
                .create_member(&crate::domain::models::GroupMember {
                    id: crate::domain::models::GroupMember::generate_id(),
                    user_id: user.id.clone(),
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
            members.push(user);
        }
        (group, members)
    }

    #[tokio::test]
    async fn test_single_voter_approval_admits_applicant() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 1).await;
        let applicant = create_user(&fx.db, "applicant").await;

        let vote = fx.votes_join(&group.id, &applicant.id).await;
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await
            .unwrap();

        assert_eq!(vote.status, VoteStatus::Approved);
        let member = fx.db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Approved);
        assert!(member.join_date.is_some());
    }

    #[tokio::test]
    async fn test_sixty_percent_threshold() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 5).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;
        assert_eq!(vote.total_voters, 5);

        // Two approvals: 40%, still pending.
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await
            .unwrap();
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[1].id, VoteDecision::Approve)
            .await
            .unwrap();
        assert_eq!(vote.status, VoteStatus::Pending);

        // Third approval: exactly 60%, resolves.
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[2].id, VoteDecision::Approve)
            .await
            .unwrap();
        assert_eq!(vote.status, VoteStatus::Approved);
    }

    #[tokio::test]
    async fn test_unreachable_threshold_rejects_early() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 5).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        // Two rejections leave at most 3/5 = 60%, still reachable.
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Reject)
            .await
            .unwrap();
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[1].id, VoteDecision::Reject)
            .await
            .unwrap();
        assert_eq!(vote.status, VoteStatus::Pending);

        // Third rejection makes 60% unreachable.
        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[2].id, VoteDecision::Reject)
            .await
            .unwrap();
        assert_eq!(vote.status, VoteStatus::Rejected);

        let member = fx.db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Rejected);
    }

    #[tokio::test]
    async fn test_duplicate_ballot_rejected() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 5).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        fx.votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await
            .unwrap();
        let result = fx
            .votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Reject)
            .await;
        assert!(matches!(result, Err(DomainError::DuplicateVote)));
    }

    #[tokio::test]
    async fn test_non_member_cannot_vote() {
        let fx = setup_test().await;
        let (group, _members) = group_with_voters(&fx, 3).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let outsider = create_user(&fx.db, "outsider").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        let result = fx
            .votes
            .cast_ballot(&vote.id, &outsider.id, VoteDecision::Approve)
            .await;
        assert!(matches!(result, Err(DomainError::NotGroupMember)));

        // The pending applicant cannot vote on their own application.
        let result = fx
            .votes
            .cast_ballot(&vote.id, &applicant.id, VoteDecision::Approve)
            .await;
        assert!(matches!(result, Err(DomainError::NotGroupMember)));
    }

    #[tokio::test]
    async fn test_edit_ballot_moves_tally() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 5).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        let vote = fx
            .votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Reject)
            .await
            .unwrap();
        assert_eq!((vote.approvals, vote.rejections), (0, 1));

        let vote = fx
            .votes
            .edit_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await
            .unwrap();
        assert_eq!((vote.approvals, vote.rejections), (1, 0));
    }

    #[tokio::test]
    async fn test_edit_without_ballot_not_found() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 3).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        let result = fx
            .votes
            .edit_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await;
        assert!(matches!(result, Err(DomainError::NotFound("Ballot"))));
    }

    #[tokio::test]
    async fn test_terminal_vote_refuses_ballots() {
        let fx = setup_test().await;
        let (group, members) = group_with_voters(&fx, 2).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let vote = fx.votes_join(&group.id, &applicant.id).await;

        fx.votes
            .cast_ballot(&vote.id, &members[0].id, VoteDecision::Approve)
            .await
            .unwrap();
        fx.votes
            .cast_ballot(&vote.id, &members[1].id, VoteDecision::Approve)
            .await
            .unwrap();

        // 2/2 approved already; any further ballot hits a closed vote.
        let late_voter = create_user(&fx.db, "late").await;
        let now = Utc::now();
        fx.db
            .create_member(&crate::domain::models::GroupMember {
                id: crate::domain::models::GroupMember::generate_id(),
                user_id: late_voter.id.clone(),
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
        let result = fx
            .votes
            .cast_ballot(&vote.id, &late_voter.id, VoteDecision::Approve)
            .await;
        assert!(matches!(result, Err(DomainError::VoteClosed)));
    }

    #[tokio::test]
    async fn test_expire_due_rejects_applicant() {
        let fx = setup_test().await;
        let (group, _members) = group_with_voters(&fx, 3).await;
        let applicant = create_user(&fx.db, "applicant").await;
        let mut vote = fx.votes_join(&group.id, &applicant.id).await;

        // Push the deadline into the past.
        vote.deadline = Utc::now() - Duration::days(1);
        sqlx::query("UPDATE votes SET deadline = ? WHERE id = ?")
            .bind(vote.deadline.to_rfc3339())
            .bind(&vote.id)
            .execute(fx.db.pool())
            .await
            .unwrap();

        let expired = fx.votes.expire_due().await.unwrap();
        assert_eq!(expired, 1);

        let vote = fx.db.get_vote(&vote.id).await.unwrap().unwrap();
        assert_eq!(vote.status, VoteStatus::Expired);
        let member = fx.db.get_member(&group.id, &applicant.id).await.unwrap().unwrap();
        assert_eq!(member.status, MembershipStatus::Rejected);
    }

    impl Fixture {
        async fn votes_join(&self, group_id: &str, user_id: &str) -> Vote {
            self.groups.join_group(group_id, user_id).await.unwrap()
        }
    }
}
