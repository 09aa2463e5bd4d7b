//! Per-task matching pipeline
//!
//! `received → admitted → candidates-selected → scored → proposals-delivered → completed`,
//! with `dropped` when admission fails and `failed` from any stage on an
//! unrecoverable error. Nothing here is fatal to the caller: every path ends
//! in a [`TaskOutcome`].

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;
use shared::{service_debug, service_error, service_info, service_warn, TaskCreated, TaskId};
use tokio::sync::watch;
use tokio::time::timeout;

use crate::config::OrchestratorConfig;
use crate::core::scorer::select_top;
use crate::core::{AdmissionController, DuplicateFilter, MatchingMetrics, ProposalManager, TaskSlot};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{CandidateSource, DeliveryTransport, EventBus, ProposalStore, Scorer};
use crate::types::{Candidate, CandidateScore, TaskContext};

/// Stages of one matching attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MatchingStage {
    Received = 0,
    Admitted = 1,
    CandidatesSelected = 2,
    Scored = 3,
    ProposalsDelivered = 4,
    Completed = 5,
}

impl MatchingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingStage::Received => "received",
            MatchingStage::Admitted => "admitted",
            MatchingStage::CandidatesSelected => "candidates_selected",
            MatchingStage::Scored => "scored",
            MatchingStage::ProposalsDelivered => "proposals_delivered",
            MatchingStage::Completed => "completed",
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => MatchingStage::Received,
            1 => MatchingStage::Admitted,
            2 => MatchingStage::CandidatesSelected,
            3 => MatchingStage::Scored,
            4 => MatchingStage::ProposalsDelivered,
            _ => MatchingStage::Completed,
        }
    }
}

impl fmt::Display for MatchingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last stage reached, readable after the attempt was abandoned
#[derive(Debug)]
struct StageTracker(AtomicU8);

impl StageTracker {
    fn new() -> Self {
        Self(AtomicU8::new(MatchingStage::Received as u8))
    }

    fn advance(&self, stage: MatchingStage) {
        self.0.store(stage as u8, Ordering::Release);
    }

    fn current(&self) -> MatchingStage {
        MatchingStage::from_u8(self.0.load(Ordering::Acquire))
    }
}

/// Terminal result of handling one task-created event
#[derive(Debug)]
pub enum TaskOutcome {
    Completed {
        task_id: TaskId,
        /// Candidates resolved before scoring
        candidates: usize,
        /// Proposals durably recorded
        created: usize,
        /// Proposals accepted by the delivery transport
        delivered: usize,
        /// Selected candidates whose proposal was not created or not delivered
        failed: usize,
    },
    /// Admission denied under saturation
    Dropped { task_id: TaskId },
    /// Suppressed redelivery inside the duplicate window
    Duplicate { task_id: TaskId },
    Failed {
        /// Unknown when the payload could not be decoded
        task_id: Option<TaskId>,
        stage: MatchingStage,
        error: OrchestratorError,
    },
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Completed { .. } => "completed",
            TaskOutcome::Dropped { .. } => "dropped",
            TaskOutcome::Duplicate { .. } => "duplicate",
            TaskOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }
}

/// Result of one candidate's create → deliver → announce unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProposalAttempt {
    NotCreated,
    Undelivered,
    Delivered,
}

#[derive(Debug, Default)]
struct MatchSummary {
    candidates: usize,
    created: usize,
    delivered: usize,
    failed: usize,
}

/// Shared state behind every spawned task handler
pub struct MatchingPipeline<B, S, T>
where
    B: EventBus + 'static,
    S: ProposalStore + 'static,
    T: DeliveryTransport + 'static,
{
    config: OrchestratorConfig,
    admission: AdmissionController,
    duplicates: Option<DuplicateFilter>,
    source: Arc<dyn CandidateSource>,
    scorer: Arc<dyn Scorer>,
    proposals: Arc<ProposalManager<S, B>>,
    transport: Arc<T>,
    metrics: Arc<MatchingMetrics>,
    cancel: watch::Receiver<bool>,
}

impl<B, S, T> MatchingPipeline<B, S, T>
where
    B: EventBus + 'static,
    S: ProposalStore + 'static,
    T: DeliveryTransport + 'static,
{
    pub(crate) fn new(
        config: OrchestratorConfig,
        source: Arc<dyn CandidateSource>,
        scorer: Arc<dyn Scorer>,
        proposals: Arc<ProposalManager<S, B>>,
        transport: Arc<T>,
        metrics: Arc<MatchingMetrics>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let admission = AdmissionController::new(config.max_concurrent_tasks, config.max_proposals_per_task);
        let duplicates = config.duplicate_window.map(DuplicateFilter::new);
        Self {
            config,
            admission,
            duplicates,
            source,
            scorer,
            proposals,
            transport,
            metrics,
            cancel,
        }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn metrics(&self) -> &Arc<MatchingMetrics> {
        &self.metrics
    }

    pub fn proposals(&self) -> &Arc<ProposalManager<S, B>> {
        &self.proposals
    }

    /// Run one task-created payload through the pipeline
    pub async fn handle_event(&self, payload: &[u8]) -> TaskOutcome {
        let started = Instant::now();
        let outcome = self.process(payload).await;
        let latency = started.elapsed();
        self.metrics.record_latency(latency);
        let latency_ms = latency.as_secs_f64() * 1000.0;

        match &outcome {
            TaskOutcome::Completed {
                task_id,
                candidates,
                created,
                delivered,
                failed,
            } => {
                self.metrics.record_task_processed();
                service_info!(
                    task_id = %task_id,
                    stage = %MatchingStage::Completed,
                    candidates,
                    created,
                    delivered,
                    failed,
                    latency_ms,
                    "✅ Task matching completed"
                );
            }
            TaskOutcome::Dropped { task_id } => {
                self.metrics.record_task_dropped();
                service_warn!(
                    task_id = %task_id,
                    error_kind = "saturation",
                    active = self.admission.active_slots(),
                    capacity = self.admission.capacity(),
                    "⚠️ Task dropped: admission saturated"
                );
            }
            TaskOutcome::Duplicate { task_id } => {
                self.metrics.record_duplicate();
                service_info!(task_id = %task_id, "🔁 Duplicate task event suppressed");
            }
            TaskOutcome::Failed { task_id, stage, error } => {
                self.metrics.record_error();
                self.metrics.record_task_failed();
                let task = task_id.as_ref().map(|t| t.as_str()).unwrap_or("<undecoded>");
                service_error!(
                    task_id = task,
                    stage = %stage,
                    error_kind = %error.kind(),
                    latency_ms,
                    "❌ Task matching failed: {}",
                    error
                );
            }
        }

        outcome
    }

    async fn process(&self, payload: &[u8]) -> TaskOutcome {
        let event = match TaskCreated::decode(payload) {
            Ok(event) => event,
            Err(e) => {
                return TaskOutcome::Failed {
                    task_id: None,
                    stage: MatchingStage::Received,
                    error: e.into(),
                }
            }
        };
        let task = TaskContext::from(event);

        if let Some(filter) = &self.duplicates {
            if filter.check_and_record(&task.task_id, Instant::now()) {
                return TaskOutcome::Duplicate { task_id: task.task_id };
            }
        }

        let slot = match self.admission.try_acquire(&task.task_id) {
            Ok(slot) => slot,
            Err(_) => {
                self.forget_duplicate(&task.task_id);
                return TaskOutcome::Dropped { task_id: task.task_id };
            }
        };

        let stage = StageTracker::new();
        stage.advance(MatchingStage::Admitted);

        let result = tokio::select! {
            bounded = timeout(self.config.task_timeout, self.match_task(&task, &slot, &stage)) => {
                bounded.unwrap_or_else(|_| Err(OrchestratorError::TaskTimeout {
                    task_id: task.task_id.clone(),
                    budget: self.config.task_timeout,
                }))
            }
            _ = cancelled(self.cancel.clone()) => Err(OrchestratorError::Cancelled { task_id: task.task_id.clone() }),
        };

        // Slot is released here on every path
        drop(slot);

        match result {
            Ok(summary) => TaskOutcome::Completed {
                task_id: task.task_id,
                candidates: summary.candidates,
                created: summary.created,
                delivered: summary.delivered,
                failed: summary.failed,
            },
            Err(error) => {
                self.forget_duplicate(&task.task_id);
                TaskOutcome::Failed {
                    task_id: Some(task.task_id),
                    stage: stage.current(),
                    error,
                }
            }
        }
    }

    /// Only completed tasks stay in the duplicate window
    fn forget_duplicate(&self, task_id: &TaskId) {
        if let Some(filter) = &self.duplicates {
            filter.forget(task_id);
        }
    }

    async fn match_task(
        &self,
        task: &TaskContext,
        slot: &TaskSlot,
        stage: &StageTracker,
    ) -> OrchestratorResult<MatchSummary> {
        service_debug!(
            task_id = %task.task_id,
            skills = ?task.skill_tags,
            budget_min = task.budget.lower,
            budget_max = task.budget.upper,
            strategy = self.source.name(),
            "🔎 Processing task"
        );

        let candidates = self.resolve_candidates(task).await?;
        stage.advance(MatchingStage::CandidatesSelected);

        if candidates.is_empty() {
            service_info!(task_id = %task.task_id, skills = ?task.skill_tags, "No candidates found for task");
            return Ok(MatchSummary::default());
        }

        let scores = self.score_candidates(task, &candidates);
        stage.advance(MatchingStage::Scored);

        let selected = select_top(scores, slot.proposal_limit());
        let strategy = self.scorer.strategy();
        let attempts = join_all(selected.iter().map(|score| self.propose(task, score, strategy))).await;
        stage.advance(MatchingStage::ProposalsDelivered);

        let created = attempts.iter().filter(|a| **a != ProposalAttempt::NotCreated).count();
        let delivered = attempts.iter().filter(|a| **a == ProposalAttempt::Delivered).count();
        Ok(MatchSummary {
            candidates: candidates.len(),
            created,
            delivered,
            failed: attempts.len() - delivered,
        })
    }

    /// Resolve through the configured strategy, bounded and deduplicated by id
    async fn resolve_candidates(&self, task: &TaskContext) -> OrchestratorResult<Vec<Candidate>> {
        let resolved = timeout(self.config.lookup_timeout, self.source.resolve(task))
            .await
            .map_err(|_| {
                OrchestratorError::lookup(format!(
                    "{} candidate resolution exceeded {:?}",
                    self.source.name(),
                    self.config.lookup_timeout
                ))
            })??;

        let mut seen = HashSet::new();
        Ok(resolved.into_iter().filter(|c| seen.insert(c.id.clone())).collect())
    }

    /// Score every candidate, skipping the ones that cannot be scored
    fn score_candidates(&self, task: &TaskContext, candidates: &[Candidate]) -> Vec<CandidateScore> {
        candidates
            .iter()
            .filter_map(|candidate| match self.scorer.score(task, candidate) {
                Ok(score) => Some(score),
                Err(e) => {
                    service_warn!(
                        task_id = %task.task_id,
                        candidate_id = %candidate.id,
                        error_kind = %e.kind(),
                        "Skipping candidate: {}",
                        e
                    );
                    None
                }
            })
            .collect()
    }

    /// Create, deliver and announce one proposal; failures stay local to this candidate
    async fn propose(&self, task: &TaskContext, score: &CandidateScore, strategy: &str) -> ProposalAttempt {
        let proposal = match self
            .proposals
            .create_proposal(&task.task_id, &score.candidate_id, score.score, strategy)
            .await
        {
            Ok(proposal) => {
                self.metrics.record_proposal_created();
                proposal
            }
            Err(e) => {
                self.metrics.record_error();
                service_error!(
                    task_id = %task.task_id,
                    candidate_id = %score.candidate_id,
                    error_kind = %e.kind(),
                    "Failed to create proposal: {}",
                    e
                );
                return ProposalAttempt::NotCreated;
            }
        };

        let request = self.proposals.delivery_request(&proposal, &self.config.delivery_options);
        if let Err(e) = self.transport.deliver(request).await {
            self.metrics.record_error();
            service_warn!(
                task_id = %task.task_id,
                candidate_id = %score.candidate_id,
                proposal_id = %proposal.id,
                error_kind = %e.kind(),
                "Proposal delivery failed: {}",
                e
            );
            return ProposalAttempt::Undelivered;
        }
        self.metrics.record_proposal_delivered();

        if let Err(e) = self.proposals.announce(&proposal).await {
            self.metrics.record_notification_failure();
            service_warn!(
                task_id = %task.task_id,
                proposal_id = %proposal.id,
                error_kind = %e.kind(),
                "Failed to publish match.proposed, proposal remains valid: {}",
                e
            );
        }

        service_debug!(
            task_id = %task.task_id,
            candidate_id = %score.candidate_id,
            proposal_id = %proposal.id,
            score = score.score,
            "📨 Proposal delivered"
        );
        ProposalAttempt::Delivered
    }
}

/// Resolves once the cancellation flag is raised; never resolves if the sender is gone
pub(crate) async fn cancelled(mut cancel: watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
