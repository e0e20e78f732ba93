use thiserror::Error;

/// Validation failures the core surfaces to the REST layer.
///
/// All variants except `Storage` are recoverable by the caller; none is
/// fatal to the process.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Group is full")]
    GroupFull,

    #[error("Group is not accepting new members")]
    GroupClosed,

    #[error("You are already a member of this group")]
    AlreadyMember,

    #[error("You have already voted on this application")]
    DuplicateVote,

    #[error("It is not your turn in the payout rotation")]
    OutOfTurn,

    #[error("No settlement wallet is linked to this account")]
    WalletNotLinked,

    #[error("Group has already completed all of its cycles")]
    GroupAlreadyCompleted,

    #[error("Trust score {0} is outside the valid range")]
    InvalidScoreRange(i64),

    #[error("Only the group admin may perform this action")]
    NotGroupAdmin,

    #[error("Only approved group members may vote")]
    NotGroupMember,

    #[error("This vote is no longer open")]
    VoteClosed,

    #[error("The voting deadline has passed")]
    DeadlinePassed,

    #[error("Cycle number is out of date; reload the group and retry")]
    StaleCycle,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
