//! Proposal lifecycle management
//!
//! The only writer of proposal records. Creation is a single atomic insert
//! with computed timestamps; the match-proposed notification that follows is
//! best effort. A periodic sweep moves stale `proposed` records to `expired`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{
    service_debug, service_info, service_warn, subjects, CandidateId, DeliveryOptions, DeliveryPayload,
    MatchProposed, ProposalDelivery, ProposalId, ProposalStatus, TaskId,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{EventBus, ProposalStore};
use crate::types::Proposal;

pub struct ProposalManager<S, B>
where
    S: ProposalStore + 'static,
    B: EventBus + 'static,
{
    store: Arc<S>,
    bus: Arc<B>,
    ttl: chrono::Duration,
}

impl<S, B> ProposalManager<S, B>
where
    S: ProposalStore + 'static,
    B: EventBus + 'static,
{
    pub fn new(store: Arc<S>, bus: Arc<B>, ttl: Duration) -> OrchestratorResult<Self> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| OrchestratorError::config("proposal_ttl out of range"))?;
        Ok(Self { store, bus, ttl })
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Durably record a new proposal in status `proposed`
    ///
    /// Either the whole record is written or the call fails and nothing is.
    pub async fn create_proposal(
        &self,
        task_id: &TaskId,
        candidate_id: &CandidateId,
        score: f64,
        strategy: &str,
    ) -> OrchestratorResult<Proposal> {
        let created_at = Utc::now();
        let proposal = Proposal {
            id: ProposalId::new(),
            task_id: task_id.clone(),
            candidate_id: candidate_id.clone(),
            score,
            status: ProposalStatus::Proposed,
            strategy: strategy.to_string(),
            created_at,
            expires_at: created_at + self.ttl,
        };

        self.store.insert(proposal.clone()).await?;

        service_debug!(
            task_id = %task_id,
            candidate_id = %candidate_id,
            proposal_id = %proposal.id,
            score,
            "📝 Proposal recorded"
        );
        Ok(proposal)
    }

    /// Delivery request for a recorded proposal
    pub fn delivery_request(&self, proposal: &Proposal, options: &DeliveryOptions) -> ProposalDelivery {
        ProposalDelivery {
            proposal_id: proposal.id,
            task_id: proposal.task_id.clone(),
            candidate_id: proposal.candidate_id.clone(),
            payload: DeliveryPayload {
                score: proposal.score,
                expires_at: proposal.expires_at,
            },
            options: options.clone(),
        }
    }

    /// Publish the match-proposed notification for a delivered proposal
    pub async fn announce(&self, proposal: &Proposal) -> OrchestratorResult<()> {
        let event = MatchProposed {
            proposal_id: proposal.id,
            task_id: proposal.task_id.clone(),
            candidate_id: proposal.candidate_id.clone(),
            score: proposal.score,
            strategy: proposal.strategy.clone(),
            occurred_at: Utc::now(),
        };
        let payload = event.encode()?;
        self.bus.publish(subjects::MATCH_PROPOSED, payload).await
    }

    /// Downstream acceptance; `false` when the proposal already left `proposed`
    pub async fn accept(&self, id: ProposalId) -> OrchestratorResult<bool> {
        self.store
            .transition(id, ProposalStatus::Proposed, ProposalStatus::Accepted)
            .await
    }

    /// Downstream rejection; `false` when the proposal already left `proposed`
    pub async fn reject(&self, id: ProposalId) -> OrchestratorResult<bool> {
        self.store
            .transition(id, ProposalStatus::Proposed, ProposalStatus::Rejected)
            .await
    }

    /// Expire every `proposed` proposal past its expiry; safe to run repeatedly
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> OrchestratorResult<u64> {
        let expired = self.store.expire_stale(now).await?;
        if expired > 0 {
            service_info!(expired, "⌛ Expired stale proposals");
        }
        Ok(expired)
    }

    /// Run the expiry sweep every `period` until `shutdown` flips to true
    pub fn spawn_expiry_sweeper(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_expired(Utc::now()).await {
                            service_warn!(error_kind = %e.kind(), "Expiry sweep failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
