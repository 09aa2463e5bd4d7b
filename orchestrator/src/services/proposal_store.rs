//! In-memory proposal persistence
//!
//! Every operation runs under one write lock, which makes inserts atomic and
//! status transitions compare-and-set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{ProposalId, ProposalStatus, TaskId};
use tokio::sync::RwLock;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::ProposalStore;
use crate::types::Proposal;

#[derive(Clone, Default)]
pub struct InMemoryProposalStore {
    proposals: Arc<RwLock<HashMap<ProposalId, Proposal>>>,
}

impl InMemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.proposals.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.proposals.read().await.is_empty()
    }

    pub async fn count_with_status(&self, status: ProposalStatus) -> usize {
        self.proposals
            .read()
            .await
            .values()
            .filter(|p| p.status == status)
            .count()
    }
}

#[async_trait::async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn insert(&self, proposal: Proposal) -> OrchestratorResult<()> {
        if proposal.expires_at < proposal.created_at {
            return Err(OrchestratorError::store(format!(
                "proposal {} expires before it was created",
                proposal.id
            )));
        }

        let mut proposals = self.proposals.write().await;
        if proposals.contains_key(&proposal.id) {
            return Err(OrchestratorError::store(format!("proposal {} already exists", proposal.id)));
        }
        proposals.insert(proposal.id, proposal);
        Ok(())
    }

    async fn get(&self, id: ProposalId) -> OrchestratorResult<Option<Proposal>> {
        Ok(self.proposals.read().await.get(&id).cloned())
    }

    async fn list_for_task(&self, task_id: &TaskId) -> OrchestratorResult<Vec<Proposal>> {
        let proposals = self.proposals.read().await;
        let mut found: Vec<Proposal> = proposals.values().filter(|p| &p.task_id == task_id).cloned().collect();
        found.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.candidate_id.cmp(&b.candidate_id)));
        Ok(found)
    }

    async fn transition(&self, id: ProposalId, from: ProposalStatus, to: ProposalStatus) -> OrchestratorResult<bool> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or(OrchestratorError::ProposalNotFound { proposal_id: id })?;

        if proposal.status != from {
            return Ok(false);
        }
        proposal.status = to;
        Ok(true)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> OrchestratorResult<u64> {
        let mut proposals = self.proposals.write().await;
        let mut expired = 0u64;
        for proposal in proposals.values_mut() {
            if proposal.status == ProposalStatus::Proposed && proposal.is_expired_at(now) {
                proposal.status = ProposalStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn snapshot(&self) -> OrchestratorResult<Vec<Proposal>> {
        let proposals = self.proposals.read().await;
        let mut all: Vec<Proposal> = proposals.values().cloned().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        Ok(all)
    }
}
