use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::domain::models::{
    Cycle, Frequency, Group, GroupMember, GroupStatus, MemberView, MembershipStatus, Payment,
    PaymentStatus, Payout, PayoutStatus, User, Vote, VoteBallot, VoteDecision, VoteStatus,
};

// The database URL for the production database
const DATABASE_URL: &str = "sqlite:rosca.db";

/// DbConnection is the persistence collaborator: single-entity load/save
/// operations over SQLite. Multi-entity invariants (member cap, vote
/// tallies) are enforced by the domain layer before anything is saved.
#[derive(Clone)]
pub struct DbConnection {
    pool: Arc<SqlitePool>,
}

impl DbConnection {
    /// Create a new database connection
    pub async fn new(url: &str) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            Sqlite::create_database(url).await?
        }

        let pool = SqlitePool::connect(url).await?;
        Self::setup_schema(&pool).await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Initialize the standard database
    pub async fn init() -> Result<Self> {
        Self::new(DATABASE_URL).await
    }

    /// Initialize a test database with a unique name
    pub async fn init_test() -> Result<Self> {
        let test_id = uuid::Uuid::new_v4().to_string();
        let db_url = format!("file:memdb_{}?mode=memory&cache=shared", test_id);

        Self::new(&db_url).await
    }

    /// Set up the required database schema
    ///
    /// One statement per call: the sqlite driver prepares a single
    /// statement at a time.
    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                mavapay_wallet_id TEXT,
                trust_score INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                admin_id TEXT NOT NULL,
                contribution_amount_btc REAL NOT NULL,
                frequency TEXT NOT NULL,
                duration_weeks INTEGER NOT NULL,
                member_cap INTEGER NOT NULL,
                is_open INTEGER NOT NULL,
                status TEXT NOT NULL,
                current_cycle_number INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                status TEXT NOT NULL,
                join_date TEXT,
                total_contributions INTEGER NOT NULL,
                has_defaulted INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, group_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                cycle_number INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,
                payout_order TEXT NOT NULL,
                UNIQUE (group_id, cycle_number)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                applicant_id TEXT NOT NULL,
                approvals INTEGER NOT NULL,
                rejections INTEGER NOT NULL,
                total_voters INTEGER NOT NULL,
                required_percentage INTEGER NOT NULL,
                deadline TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vote_ballots (
                vote_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                decision TEXT NOT NULL,
                cast_at TEXT NOT NULL,
                PRIMARY KEY (vote_id, voter_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                cycle_number INTEGER NOT NULL,
                amount_btc REAL NOT NULL,
                lightning_invoice TEXT,
                status TEXT NOT NULL,
                due_date TEXT NOT NULL,
                paid_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payouts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                cycle_number INTEGER NOT NULL,
                amount_btc REAL NOT NULL,
                status TEXT NOT NULL,
                mavapay_ref TEXT,
                trust_score_at_payout INTEGER NOT NULL,
                paid_at TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trust_history (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                score INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Get the underlying SQLite pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -----------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------

    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, name, email, mavapay_wallet_id, trust_score, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.mavapay_wallet_id)
        .bind(user.trust_score)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    pub async fn update_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "UPDATE users SET name = ?, email = ?, mavapay_wallet_id = ?, trust_score = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.mavapay_wallet_id)
        .bind(user.trust_score)
        .bind(user.updated_at.to_rfc3339())
        .bind(&user.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------

    pub async fn create_group(&self, group: &Group) -> Result<()> {
        sqlx::query(
            "INSERT INTO groups (id, name, description, admin_id, contribution_amount_btc, frequency,
                                 duration_weeks, member_cap, is_open, status, current_cycle_number,
                                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(&group.admin_id)
        .bind(group.contribution_amount_btc)
        .bind(group.frequency.to_string())
        .bind(group.duration_weeks)
        .bind(group.member_cap)
        .bind(group.is_open)
        .bind(group.status.to_string())
        .bind(group.current_cycle_number)
        .bind(group.created_at.to_rfc3339())
        .bind(group.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_group(&r)).transpose()
    }

    pub async fn update_group(&self, group: &Group) -> Result<()> {
        sqlx::query(
            "UPDATE groups SET name = ?, description = ?, is_open = ?, status = ?,
                               current_cycle_number = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.is_open)
        .bind(group.status.to_string())
        .bind(group.current_cycle_number)
        .bind(group.updated_at.to_rfc3339())
        .bind(&group.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Open groups, newest first, paginated.
    pub async fn list_open_groups(&self, limit: i64, offset: i64) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT * FROM groups WHERE is_open = 1 ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(row_to_group).collect()
    }

    pub async fn count_open_groups(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM groups WHERE is_open = 1")
            .fetch_one(&*self.pool)
            .await?;
        Ok(row.get("cnt"))
    }

    pub async fn count_approved_members(&self, group_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM group_members WHERE group_id = ? AND status = 'approved'",
        )
        .bind(group_id)
        .fetch_one(&*self.pool)
        .await?;
        Ok(row.get("cnt"))
    }

    // -----------------------------------------------------------------
    // Group members
    // -----------------------------------------------------------------

    pub async fn create_member(&self, member: &GroupMember) -> Result<()> {
        sqlx::query(
            "INSERT INTO group_members (id, user_id, group_id, status, join_date,
                                        total_contributions, has_defaulted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&member.id)
        .bind(&member.user_id)
        .bind(&member.group_id)
        .bind(member.status.to_string())
        .bind(member.join_date.map(|d| d.to_rfc3339()))
        .bind(member.total_contributions)
        .bind(member.has_defaulted)
        .bind(member.created_at.to_rfc3339())
        .bind(member.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_member(&self, group_id: &str, user_id: &str) -> Result<Option<GroupMember>> {
        let row = sqlx::query("SELECT * FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_member(&r)).transpose()
    }

    pub async fn update_member(&self, member: &GroupMember) -> Result<()> {
        sqlx::query(
            "UPDATE group_members SET status = ?, join_date = ?, total_contributions = ?,
                                      has_defaulted = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(member.status.to_string())
        .bind(member.join_date.map(|d| d.to_rfc3339()))
        .bind(member.total_contributions)
        .bind(member.has_defaulted)
        .bind(member.updated_at.to_rfc3339())
        .bind(&member.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// All member rows of a group joined through to the owning user, in
    /// membership creation order. Trust scores come from the users table.
    pub async fn list_member_views(&self, group_id: &str) -> Result<Vec<MemberView>> {
        let rows = sqlx::query(
            "SELECT m.*, u.name AS user_name, u.trust_score AS user_trust_score
             FROM group_members m
             JOIN users u ON u.id = m.user_id
             WHERE m.group_id = ?
             ORDER BY m.created_at ASC",
        )
        .bind(group_id)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter()
            .map(|r| {
                Ok(MemberView {
                    member: row_to_member(r)?,
                    name: r.get("user_name"),
                    trust_score: r.get("user_trust_score"),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------
    // Cycles
    // -----------------------------------------------------------------

    pub async fn create_cycle(&self, cycle: &Cycle) -> Result<()> {
        sqlx::query(
            "INSERT INTO cycles (id, group_id, cycle_number, start_date, end_date, payout_order)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&cycle.id)
        .bind(&cycle.group_id)
        .bind(cycle.cycle_number)
        .bind(cycle.start_date.to_rfc3339())
        .bind(cycle.end_date.to_rfc3339())
        .bind(serde_json::to_string(&cycle.payout_order)?)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_cycle(&self, group_id: &str, cycle_number: i64) -> Result<Option<Cycle>> {
        let row = sqlx::query("SELECT * FROM cycles WHERE group_id = ? AND cycle_number = ?")
            .bind(group_id)
            .bind(cycle_number)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_cycle(&r)).transpose()
    }

    // -----------------------------------------------------------------
    // Votes
    // -----------------------------------------------------------------

    pub async fn create_vote(&self, vote: &Vote) -> Result<()> {
        sqlx::query(
            "INSERT INTO votes (id, group_id, applicant_id, approvals, rejections, total_voters,
                                required_percentage, deadline, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&vote.id)
        .bind(&vote.group_id)
        .bind(&vote.applicant_id)
        .bind(vote.approvals)
        .bind(vote.rejections)
        .bind(vote.total_voters)
        .bind(vote.required_percentage)
        .bind(vote.deadline.to_rfc3339())
        .bind(vote.status.to_string())
        .bind(vote.created_at.to_rfc3339())
        .bind(vote.updated_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_vote(&self, vote_id: &str) -> Result<Option<Vote>> {
        let row = sqlx::query("SELECT * FROM votes WHERE id = ?")
            .bind(vote_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_vote(&r)).transpose()
    }

    pub async fn update_vote(&self, vote: &Vote) -> Result<()> {
        sqlx::query(
            "UPDATE votes SET approvals = ?, rejections = ?, status = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(vote.approvals)
        .bind(vote.rejections)
        .bind(vote.status.to_string())
        .bind(vote.updated_at.to_rfc3339())
        .bind(&vote.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Votes in groups where the given user is an approved member,
    /// newest first.
    pub async fn list_votes_for_voter(&self, voter_id: &str) -> Result<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT * FROM votes
             WHERE group_id IN (
                 SELECT group_id FROM group_members WHERE user_id = ? AND status = 'approved'
             )
             ORDER BY created_at DESC",
        )
        .bind(voter_id)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(row_to_vote).collect()
    }

    /// Pending votes whose deadline has passed.
    pub async fn list_votes_past_deadline(&self, now: DateTime<Utc>) -> Result<Vec<Vote>> {
        let rows = sqlx::query("SELECT * FROM votes WHERE status = 'pending' AND deadline < ?")
            .bind(now.to_rfc3339())
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_vote).collect()
    }

    pub async fn create_ballot(&self, ballot: &VoteBallot) -> Result<()> {
        sqlx::query(
            "INSERT INTO vote_ballots (vote_id, voter_id, decision, cast_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&ballot.vote_id)
        .bind(&ballot.voter_id)
        .bind(ballot.decision.to_string())
        .bind(ballot.cast_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_ballot(&self, vote_id: &str, voter_id: &str) -> Result<Option<VoteBallot>> {
        let row = sqlx::query("SELECT * FROM vote_ballots WHERE vote_id = ? AND voter_id = ?")
            .bind(vote_id)
            .bind(voter_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_ballot(&r)).transpose()
    }

    pub async fn update_ballot(&self, ballot: &VoteBallot) -> Result<()> {
        sqlx::query(
            "UPDATE vote_ballots SET decision = ?, cast_at = ? WHERE vote_id = ? AND voter_id = ?",
        )
        .bind(ballot.decision.to_string())
        .bind(ballot.cast_at.to_rfc3339())
        .bind(&ballot.vote_id)
        .bind(&ballot.voter_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Payments
    // -----------------------------------------------------------------

    pub async fn create_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments (id, user_id, group_id, cycle_number, amount_btc,
                                   lightning_invoice, status, due_date, paid_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&payment.id)
        .bind(&payment.user_id)
        .bind(&payment.group_id)
        .bind(payment.cycle_number)
        .bind(payment.amount_btc)
        .bind(&payment.lightning_invoice)
        .bind(payment.status.to_string())
        .bind(payment.due_date.to_rfc3339())
        .bind(payment.paid_at.map(|d| d.to_rfc3339()))
        .bind(payment.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = ?")
            .bind(payment_id)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|r| row_to_payment(&r)).transpose()
    }

    pub async fn update_payment(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "UPDATE payments SET lightning_invoice = ?, status = ?, paid_at = ? WHERE id = ?",
        )
        .bind(&payment.lightning_invoice)
        .bind(payment.status.to_string())
        .bind(payment.paid_at.map(|d| d.to_rfc3339()))
        .bind(&payment.id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_payments_for_user(&self, user_id: &str) -> Result<Vec<Payment>> {
        let rows = sqlx::query("SELECT * FROM payments WHERE user_id = ? ORDER BY due_date DESC")
            .bind(user_id)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_payment).collect()
    }

    /// Contributions for one cycle that are still unsettled.
    pub async fn list_unpaid_payments_for_cycle(
        &self,
        group_id: &str,
        cycle_number: i64,
    ) -> Result<Vec<Payment>> {
        let rows = sqlx::query(
            "SELECT * FROM payments
             WHERE group_id = ? AND cycle_number = ? AND status = 'pending'",
        )
        .bind(group_id)
        .bind(cycle_number)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(row_to_payment).collect()
    }

    // -----------------------------------------------------------------
    // Payouts
    // -----------------------------------------------------------------

    pub async fn create_payout(&self, payout: &Payout) -> Result<()> {
        sqlx::query(
            "INSERT INTO payouts (id, user_id, group_id, cycle_number, amount_btc, status,
                                  mavapay_ref, trust_score_at_payout, paid_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&payout.id)
        .bind(&payout.user_id)
        .bind(&payout.group_id)
        .bind(payout.cycle_number)
        .bind(payout.amount_btc)
        .bind(payout.status.to_string())
        .bind(&payout.mavapay_ref)
        .bind(payout.trust_score_at_payout)
        .bind(payout.paid_at.map(|d| d.to_rfc3339()))
        .bind(payout.created_at.to_rfc3339())
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_payouts_for_user(&self, user_id: &str) -> Result<Vec<Payout>> {
        let rows = sqlx::query("SELECT * FROM payouts WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_payout).collect()
    }

    /// Payouts already disbursed against one group cycle.
    pub async fn list_payouts_for_cycle(
        &self,
        group_id: &str,
        cycle_number: i64,
    ) -> Result<Vec<Payout>> {
        let rows = sqlx::query("SELECT * FROM payouts WHERE group_id = ? AND cycle_number = ?")
            .bind(group_id)
            .bind(cycle_number)
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(row_to_payout).collect()
    }

    // -----------------------------------------------------------------
    // Trust score history
    // -----------------------------------------------------------------

    pub async fn append_trust_snapshot(
        &self,
        user_id: &str,
        date: DateTime<Utc>,
        score: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO trust_history (user_id, date, score) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(date.to_rfc3339())
            .bind(score)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_trust_snapshots(&self, user_id: &str) -> Result<Vec<(DateTime<Utc>, i64)>> {
        let rows = sqlx::query(
            "SELECT date, score FROM trust_history WHERE user_id = ? ORDER BY date ASC",
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter()
            .map(|r| Ok((parse_datetime(&r.get::<String, _>("date"))?, r.get("score"))))
            .collect()
    }
}

// ---------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

fn parse_optional_datetime(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_datetime).transpose()
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        mavapay_wallet_id: row.get("mavapay_wallet_id"),
        trust_score: row.get("trust_score"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_group(row: &SqliteRow) -> Result<Group> {
    Ok(Group {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        admin_id: row.get("admin_id"),
        contribution_amount_btc: row.get("contribution_amount_btc"),
        frequency: Frequency::from_string(&row.get::<String, _>("frequency"))
            .map_err(|e| anyhow::anyhow!(e))?,
        duration_weeks: row.get("duration_weeks"),
        member_cap: row.get("member_cap"),
        is_open: row.get("is_open"),
        status: GroupStatus::from_string(&row.get::<String, _>("status"))
            .map_err(|e| anyhow::anyhow!(e))?,
        current_cycle_number: row.get("current_cycle_number"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_member(row: &SqliteRow) -> Result<GroupMember> {
    Ok(GroupMember {
        id: row.get("id"),
        user_id: row.get("user_id"),
        group_id: row.get("group_id"),
        status: MembershipStatus::from_string(&row.get::<String, _>("status"))
            .map_err(|e| anyhow::anyhow!(e))?,
        join_date: parse_optional_datetime(row.get("join_date"))?,
        total_contributions: row.get("total_contributions"),
        has_defaulted: row.get("has_defaulted"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_cycle(row: &SqliteRow) -> Result<Cycle> {
    Ok(Cycle {
        id: row.get("id"),
        group_id: row.get("group_id"),
        cycle_number: row.get("cycle_number"),
        start_date: parse_datetime(&row.get::<String, _>("start_date"))?,
        end_date: parse_datetime(&row.get::<String, _>("end_date"))?,
        payout_order: serde_json::from_str(&row.get::<String, _>("payout_order"))?,
    })
}

fn row_to_vote(row: &SqliteRow) -> Result<Vote> {
    Ok(Vote {
        id: row.get("id"),
        group_id: row.get("group_id"),
        applicant_id: row.get("applicant_id"),
        approvals: row.get("approvals"),
        rejections: row.get("rejections"),
        total_voters: row.get("total_voters"),
        required_percentage: row.get("required_percentage"),
        deadline: parse_datetime(&row.get::<String, _>("deadline"))?,
        status: VoteStatus::from_string(&row.get::<String, _>("status"))
            .map_err(|e| anyhow::anyhow!(e))?,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
    })
}

fn row_to_ballot(row: &SqliteRow) -> Result<VoteBallot> {
    Ok(VoteBallot {
        vote_id: row.get("vote_id"),
        voter_id: row.get("voter_id"),
        decision: VoteDecision::from_string(&row.get::<String, _>("decision"))
            .map_err(|e| anyhow::anyhow!(e))?,
        cast_at: parse_datetime(&row.get::<String, _>("cast_at"))?,
    })
}

fn row_to_payment(row: &SqliteRow) -> Result<Payment> {
    Ok(Payment {
        id: row.get("id"),
        user_id: row.get("user_id"),
        group_id: row.get("group_id"),
        cycle_number: row.get("cycle_number"),
        amount_btc: row.get("amount_btc"),
        lightning_invoice: row.get("lightning_invoice"),
        status: PaymentStatus::from_string(&row.get::<String, _>("status"))
            .map_err(|e| anyhow::anyhow!(e))?,
        due_date: parse_datetime(&row.get::<String, _>("due_date"))?,
        paid_at: parse_optional_datetime(row.get("paid_at"))?,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
    })
}

fn row_to_payout(row: &SqliteRow) -> Result<Payout> {
    Ok(Payout {
        id: row.get("id"),
        user_id: row.get("user_id"),
        group_id: row.get("group_id"),
        cycle_number: row.get("cycle_number"),
        amount_btc: row.get("amount_btc"),
        status: PayoutStatus::from_string(&row.get::<String, _>("status"))
            .map_err(|e| anyhow::anyhow!(e))?,
        mavapay_ref: row.get("mavapay_ref"),
        trust_score_at_payout: row.get("trust_score_at_payout"),
        paid_at: parse_optional_datetime(row.get("paid_at"))?,
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trust::STARTING_SCORE;

    async fn setup_test() -> DbConnection {
        DbConnection::init_test().await.expect("Failed to create test database")
    }

    fn test_user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: User::generate_id(),
            name: name.to_string(),
            email: format!("{}@example.com", name),
            mavapay_wallet_id: None,
            trust_score: STARTING_SCORE,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = setup_test().await;
        let user = test_user("alice");

        db.create_user(&user).await.expect("Failed to create user");
        let loaded = db.get_user(&user.id).await.expect("Failed to load user");

        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.email, "alice@example.com");
        assert_eq!(loaded.trust_score, STARTING_SCORE);
    }

    #[tokio::test]
    async fn test_get_nonexistent_user() {
        let db = setup_test().await;
        let loaded = db.get_user("user::missing").await.expect("Query failed");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_update_user_trust_score() {
        let db = setup_test().await;
        let mut user = test_user("bob");
        db.create_user(&user).await.unwrap();

        user.trust_score = 505;
        user.updated_at = Utc::now();
        db.update_user(&user).await.unwrap();

        let loaded = db.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(loaded.trust_score, 505);
    }

    #[tokio::test]
    async fn test_cycle_payout_order_round_trips() {
        let db = setup_test().await;
        let now = Utc::now();
        let cycle = Cycle {
            id: Cycle::generate_id(),
            group_id: "group::g".to_string(),
            cycle_number: 1,
            start_date: now,
            end_date: now + chrono::Duration::weeks(1),
            payout_order: vec!["user::a".to_string(), "user::b".to_string()],
        };

        db.create_cycle(&cycle).await.unwrap();
        let loaded = db.get_cycle("group::g", 1).await.unwrap().unwrap();

        assert_eq!(loaded.payout_order, cycle.payout_order);
    }

    #[tokio::test]
    async fn test_trust_history_ordering() {
        let db = setup_test().await;
        let user = test_user("carol");
        db.create_user(&user).await.unwrap();

        let base = Utc::now();
        db.append_trust_snapshot(&user.id, base + chrono::Duration::days(1), 505)
            .await
            .unwrap();
        db.append_trust_snapshot(&user.id, base, 500).await.unwrap();

        let history = db.list_trust_snapshots(&user.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].1, 500);
        assert_eq!(history[1].1, 505);
    }
}
