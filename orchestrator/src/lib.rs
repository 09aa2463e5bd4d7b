//! Matching orchestrator library
//!
//! Consumes task-created events, selects and scores candidate workers under
//! admission control, and fans out time-bound proposals with per-candidate
//! failure isolation.

pub mod config;
pub mod core;
pub mod error;
pub mod feed;
pub mod matching;
pub mod orchestrator;
pub mod pipeline;
pub mod services;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{CandidateStrategy, OrchestratorConfig};
pub use core::{AdmissionController, MatchingMetrics, MetricsSnapshot, ProposalManager, ScoreWeights, WeightedScorer};
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use matching::build_candidate_source;
pub use orchestrator::Orchestrator;
pub use pipeline::{MatchingStage, TaskOutcome};
pub use traits::{CandidateIndex, CandidateSource, DeliveryTransport, EventBus, ProfileStore, ProposalStore, Scorer};
