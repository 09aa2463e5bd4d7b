//! Shared types for the task matching platform
//!
//! Contains identifiers, event contracts and the logging bootstrap used by
//! every service that talks over the platform's pub/sub subjects.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use logging::LogFormat;
pub use types::*;

pub use messages::{
    subjects, DeliveryOptions, DeliveryPayload, MatchProposed, ProposalDelivery, TaskCreated,
};
