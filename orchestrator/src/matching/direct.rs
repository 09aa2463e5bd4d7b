//! Candidate resolution by querying the profile store directly
//!
//! Used when the fast index is unavailable or for low-volume deployments.

use std::sync::Arc;

use crate::error::OrchestratorResult;
use crate::traits::{CandidateSource, ProfileStore};
use crate::types::{Candidate, TaskContext};

pub struct DirectQuerySource<P: ProfileStore> {
    profiles: Arc<P>,
    top_k: usize,
}

impl<P: ProfileStore> DirectQuerySource<P> {
    pub fn new(profiles: Arc<P>, top_k: usize) -> Self {
        Self { profiles, top_k }
    }
}

#[async_trait::async_trait]
impl<P: ProfileStore + 'static> CandidateSource for DirectQuerySource<P> {
    async fn resolve(&self, task: &TaskContext) -> OrchestratorResult<Vec<Candidate>> {
        let profiles = self
            .profiles
            .find_matching(&task.skill_tags, task.budget, self.top_k)
            .await?;
        Ok(profiles.iter().map(|p| p.to_candidate()).collect())
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}
