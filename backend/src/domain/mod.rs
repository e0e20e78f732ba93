//! Domain layer: entities, invariants and the services that enforce
//! them. Persistence stays behind [`crate::db::DbConnection`]; external
//! money movement stays behind the [`settlement`] gateway traits.

pub mod cycle_service;
pub mod errors;
pub mod group_service;
pub mod locks;
pub mod models;
pub mod payment_service;
pub mod payout_service;
pub mod rotation;
pub mod settlement;
pub mod trust;
pub mod trust_service;
pub mod user_service;
pub mod vote_service;

pub use cycle_service::{CycleAdvance, CycleService};
pub use errors::{DomainError, DomainResult};
pub use group_service::{GroupDetailView, GroupOverview, GroupService};
pub use locks::GroupLocks;
pub use payment_service::{ContributionReceipt, PaymentService};
pub use payout_service::{PayoutService, QueueSlot};
pub use trust_service::TrustService;
pub use user_service::UserService;
pub use vote_service::VoteService;
