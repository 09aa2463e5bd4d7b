//! Service implementations
//!
//! In-process implementations of the collaborator traits. They make the
//! binary runnable without external infrastructure and back the integration
//! tests.

pub mod delivery;
pub mod event_bus;
pub mod profile_store;
pub mod proposal_store;

#[cfg(test)]
mod tests;

pub use delivery::BusDeliveryTransport;
pub use event_bus::InMemoryEventBus;
pub use profile_store::InMemoryProfileStore;
pub use proposal_store::InMemoryProposalStore;
