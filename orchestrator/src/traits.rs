//! Trait definitions with mockall annotations for testing
//!
//! Every external collaborator of the matching pipeline sits behind one of
//! these traits so the orchestrator can be driven by in-process services or
//! by mocks in tests.

use chrono::{DateTime, Utc};
use shared::{CandidateId, ProposalDelivery, ProposalId, ProposalStatus, TaskId};
use tokio::sync::mpsc;

use crate::error::OrchestratorResult;
use crate::types::{BudgetRange, Candidate, CandidateScore, Proposal, TaskContext, WorkerProfile};

/// Publish/subscribe transport for platform events
///
/// Delivery is at-least-once; subscribers must tolerate duplicates.
#[mockall::automock]
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an encoded payload on a subject
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> OrchestratorResult<()>;

    /// Subscribe to a subject
    ///
    /// # Returns
    /// Receiver yielding every payload published on the subject after this call
    async fn subscribe(&self, subject: &str) -> OrchestratorResult<mpsc::Receiver<Vec<u8>>>;
}

/// Fast skill-keyed lookup owned by the profile/presence store
#[mockall::automock]
#[async_trait::async_trait]
pub trait CandidateIndex: Send + Sync {
    /// Top-ranked online worker ids holding `skill`, best first
    async fn ids_for_skill(&self, skill: &str, limit: usize) -> OrchestratorResult<Vec<CandidateId>>;

    /// Current profile of a worker, `None` when the id is unknown
    async fn profile(&self, id: &CandidateId) -> OrchestratorResult<Option<WorkerProfile>>;
}

/// Authoritative profile store queried with task filters
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Online workers sharing any of `skills` whose rate lies inside `budget`
    ///
    /// # Returns
    /// At most `limit` profiles, ordered by rating then most recent activity
    async fn find_matching(
        &self,
        skills: &[String],
        budget: BudgetRange,
        limit: usize,
    ) -> OrchestratorResult<Vec<WorkerProfile>>;
}

/// Candidate-resolution strategy used by the orchestrator
#[mockall::automock]
#[async_trait::async_trait]
pub trait CandidateSource: Send + Sync {
    /// Resolve candidates for a task; an empty result is a normal outcome
    async fn resolve(&self, task: &TaskContext) -> OrchestratorResult<Vec<Candidate>>;

    /// Short label used in logs
    fn name(&self) -> &'static str;
}

/// Match quality function shared by every resolution strategy
#[mockall::automock]
pub trait Scorer: Send + Sync {
    /// Score a candidate for a task; the result lies in `[0, 1]`
    fn score(&self, task: &TaskContext, candidate: &Candidate) -> OrchestratorResult<CandidateScore>;

    /// Label recorded on proposals produced from these scores
    fn strategy(&self) -> &'static str;
}

/// Durable proposal persistence
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProposalStore: Send + Sync {
    /// Insert a new proposal atomically; fails without writing anything on conflict
    async fn insert(&self, proposal: Proposal) -> OrchestratorResult<()>;

    async fn get(&self, id: ProposalId) -> OrchestratorResult<Option<Proposal>>;

    async fn list_for_task(&self, task_id: &TaskId) -> OrchestratorResult<Vec<Proposal>>;

    /// Move a proposal from `from` to `to`
    ///
    /// # Returns
    /// `false` when the proposal was not in status `from`, `ProposalNotFound` when it does not exist
    async fn transition(&self, id: ProposalId, from: ProposalStatus, to: ProposalStatus) -> OrchestratorResult<bool>;

    /// Mark every `proposed` proposal with `expires_at <= now` as expired
    ///
    /// # Returns
    /// Number of proposals transitioned by this call
    async fn expire_stale(&self, now: DateTime<Utc>) -> OrchestratorResult<u64>;

    /// Copy of every stored proposal
    async fn snapshot(&self) -> OrchestratorResult<Vec<Proposal>>;
}

/// Notification transport that pushes a proposal to a worker
///
/// Success or failure only; retries up to the requested count are the
/// transport's job.
#[mockall::automock]
#[async_trait::async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, delivery: ProposalDelivery) -> OrchestratorResult<()>;
}
