//! Interchangeable candidate-resolution strategies
//!
//! Both strategies feed the same scorer and proposal lifecycle; they differ
//! only in how candidates are found.

pub mod direct;
pub mod indexed;

use std::sync::Arc;

pub use direct::DirectQuerySource;
pub use indexed::IndexedCandidateSource;

use crate::config::{CandidateStrategy, OrchestratorConfig};
use crate::traits::{CandidateIndex, CandidateSource, ProfileStore};

/// Build the configured strategy over a store that offers both lookups
pub fn build_candidate_source<P>(config: &OrchestratorConfig, profiles: Arc<P>) -> Arc<dyn CandidateSource>
where
    P: CandidateIndex + ProfileStore + 'static,
{
    match config.candidate_strategy {
        CandidateStrategy::Indexed => Arc::new(IndexedCandidateSource::new(profiles, config.index_per_skill_limit)),
        CandidateStrategy::Direct => Arc::new(DirectQuerySource::new(profiles, config.direct_top_k)),
    }
}
