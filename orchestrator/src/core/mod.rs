//! Core business logic modules
//!
//! Scoring, admission control, metrics aggregation and proposal lifecycle.
//! Nothing here talks to a transport directly; collaborators arrive through
//! the traits in [`crate::traits`].

pub mod admission;
pub mod lifecycle;
pub mod metrics;
pub mod scorer;

pub use admission::{AdmissionController, DuplicateFilter, TaskSlot};
pub use lifecycle::ProposalManager;
pub use metrics::{LatencySummary, MatchingMetrics, MetricsReporter, MetricsSnapshot};
pub use scorer::{select_top, ScoreWeights, WeightedScorer};
