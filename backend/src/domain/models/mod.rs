//! Domain entities and their storage codecs.

pub mod cycle;
pub mod group;
pub mod member;
pub mod payment;
pub mod payout;
pub mod user;
pub mod vote;

pub use cycle::Cycle;
pub use group::{Frequency, Group, GroupStatus};
pub use member::{GroupMember, MemberView, MembershipStatus};
pub use payment::{Payment, PaymentStatus, PAYMENT_WINDOW_DAYS};
pub use payout::{Payout, PayoutStatus};
pub use user::User;
pub use vote::{Vote, VoteBallot, VoteDecision, VoteStatus, REQUIRED_PERCENTAGE, VOTE_WINDOW_DAYS};
