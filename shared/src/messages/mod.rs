//! Event contracts exchanged over the platform's pub/sub subjects
//!
//! - `task`: task lifecycle events published by the task service
//! - `matching`: match outcomes published by the orchestrator
//! - `delivery`: delivery requests handed to the notification transport

pub mod delivery;
pub mod matching;
pub mod task;

pub use delivery::{DeliveryOptions, DeliveryPayload, ProposalDelivery};
pub use matching::MatchProposed;
pub use task::TaskCreated;

/// Pub/sub subject names
pub mod subjects {
    pub const TASK_CREATED: &str = "task.created";
    pub const MATCH_PROPOSED: &str = "match.proposed";
    pub const PROPOSAL_DELIVERY: &str = "proposal.delivery";
}
