//! Candidate resolution through the fast skill index

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use shared::{service_debug, service_warn, CandidateId};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{CandidateIndex, CandidateSource};
use crate::types::{BudgetRange, Candidate, TaskContext};

/// Unions the top-ranked workers of every required skill, then pre-filters by budget
pub struct IndexedCandidateSource<I: CandidateIndex> {
    index: Arc<I>,
    per_skill_limit: usize,
}

impl<I: CandidateIndex> IndexedCandidateSource<I> {
    pub fn new(index: Arc<I>, per_skill_limit: usize) -> Self {
        Self { index, per_skill_limit }
    }

    /// Loose budget compatibility check; a zero budget is unconstrained
    pub fn budget_compatible(budget: &BudgetRange, rate: f64) -> bool {
        if budget.upper <= 0.0 {
            return true;
        }
        rate >= budget.lower * 0.5 && rate <= budget.upper * 1.5
    }

    async fn collect_ids(&self, task: &TaskContext) -> OrchestratorResult<Vec<CandidateId>> {
        let lookups = task
            .skill_tags
            .iter()
            .map(|skill| self.index.ids_for_skill(skill, self.per_skill_limit));
        let results = join_all(lookups).await;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let mut failed = 0usize;

        // Results come back in skill order, so the union stays deterministic
        for (skill, result) in task.skill_tags.iter().zip(results) {
            match result {
                Ok(found) => {
                    for id in found {
                        if seen.insert(id.clone()) {
                            ids.push(id);
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    service_warn!(
                        task_id = %task.task_id,
                        skill = %skill,
                        error_kind = %e.kind(),
                        "Skill index lookup failed, skipping: {}",
                        e
                    );
                }
            }
        }

        if failed == task.skill_tags.len() {
            return Err(OrchestratorError::lookup(format!(
                "all {failed} skill index lookups failed for task {}",
                task.task_id
            )));
        }
        Ok(ids)
    }
}

#[async_trait::async_trait]
impl<I: CandidateIndex + 'static> CandidateSource for IndexedCandidateSource<I> {
    async fn resolve(&self, task: &TaskContext) -> OrchestratorResult<Vec<Candidate>> {
        if task.skill_tags.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.collect_ids(task).await?;
        let mut candidates = Vec::with_capacity(ids.len());

        for id in ids {
            match self.index.profile(&id).await {
                Ok(Some(profile)) if Self::budget_compatible(&task.budget, profile.hourly_rate) => {
                    candidates.push(profile.to_candidate());
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    service_debug!(task_id = %task.task_id, candidate_id = %id, "Indexed worker has no profile");
                }
                Err(e) => {
                    service_warn!(
                        task_id = %task.task_id,
                        candidate_id = %id,
                        error_kind = %e.kind(),
                        "Profile lookup failed, skipping: {}",
                        e
                    );
                }
            }
        }

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "indexed"
    }
}
