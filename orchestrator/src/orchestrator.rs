//! Main orchestrator implementation
//!
//! Consumes task-created events, runs each one through the matching pipeline
//! on its own task, and keeps the metrics reporter and expiry sweeper running
//! beside the consumer loop.

use std::sync::Arc;

use shared::{logging, service_debug, service_error, service_info, service_warn, subjects, ServiceId};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::timeout;

use crate::config::OrchestratorConfig;
use crate::core::{AdmissionController, MatchingMetrics, MetricsReporter, MetricsSnapshot, ProposalManager};
use crate::error::OrchestratorResult;
use crate::pipeline::{MatchingPipeline, TaskOutcome};
use crate::traits::{CandidateSource, DeliveryTransport, EventBus, ProposalStore, Scorer};

/// Main orchestrator that coordinates matching for every incoming task
pub struct Orchestrator<B, S, T>
where
    B: EventBus + 'static,
    S: ProposalStore + 'static,
    T: DeliveryTransport + 'static,
{
    config: OrchestratorConfig,
    bus: Arc<B>,
    pipeline: Arc<MatchingPipeline<B, S, T>>,

    /// Inbound task-created stream, set by `initialize`
    events_rx: Option<mpsc::Receiver<Vec<u8>>>,

    /// Raised to cancel in-flight matching and stop background tasks
    cancel_tx: watch::Sender<bool>,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<B, S, T> Orchestrator<B, S, T>
where
    B: EventBus + 'static,
    S: ProposalStore + 'static,
    T: DeliveryTransport + 'static,
{
    /// Create new orchestrator with injected dependencies
    pub fn new(
        config: OrchestratorConfig,
        bus: Arc<B>,
        store: Arc<S>,
        transport: Arc<T>,
        source: Arc<dyn CandidateSource>,
        scorer: Arc<dyn Scorer>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let proposals = Arc::new(ProposalManager::new(store, Arc::clone(&bus), config.proposal_ttl)?);
        let metrics = Arc::new(MatchingMetrics::new(config.latency_sample_capacity));
        let pipeline = Arc::new(MatchingPipeline::new(
            config.clone(),
            source,
            scorer,
            proposals,
            transport,
            metrics,
            cancel_rx,
        ));

        Ok(Self {
            config,
            bus,
            pipeline,
            events_rx: None,
            cancel_tx,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<MatchingMetrics> {
        Arc::clone(self.pipeline.metrics())
    }

    pub fn admission(&self) -> &AdmissionController {
        self.pipeline.admission()
    }

    pub fn proposals(&self) -> Arc<ProposalManager<S, B>> {
        Arc::clone(self.pipeline.proposals())
    }

    /// Get shutdown sender for external shutdown requests
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Subscribe to task-created events
    ///
    /// Events published after this call are buffered until `run` consumes them.
    pub async fn initialize(&mut self) -> OrchestratorResult<()> {
        if self.events_rx.is_none() {
            self.events_rx = Some(self.bus.subscribe(subjects::TASK_CREATED).await?);
            service_debug!(subject = subjects::TASK_CREATED, "📡 Subscribed to task events");
        }
        Ok(())
    }

    /// Process one encoded task-created event outside the consumer loop
    pub async fn handle_event(&self, payload: &[u8]) -> TaskOutcome {
        self.pipeline.handle_event(payload).await
    }

    /// Main event loop
    ///
    /// Each event is handled on its own task; admission control bounds how
    /// many of them do real work at once. Returns after a shutdown request or
    /// when the event stream closes, once in-flight handlers are drained.
    pub async fn run(&mut self) -> OrchestratorResult<()> {
        self.initialize().await?;
        let Some(mut events) = self.events_rx.take() else {
            return Ok(());
        };
        logging::log_startup(
            ServiceId::current(),
            &format!(
                "matching orchestrator (strategy={}, max_concurrent_tasks={}, max_proposals_per_task={})",
                self.config.candidate_strategy, self.config.max_concurrent_tasks, self.config.max_proposals_per_task
            ),
        );

        let reporter = MetricsReporter::new(
            self.metrics(),
            self.admission().clone(),
            self.config.metrics_interval,
        )
        .spawn(self.cancel_tx.subscribe());
        let sweeper = self
            .proposals()
            .spawn_expiry_sweeper(self.config.sweep_interval, self.cancel_tx.subscribe());

        let mut handlers: JoinSet<TaskOutcome> = JoinSet::new();
        let reason = loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(payload) => {
                        let pipeline = Arc::clone(&self.pipeline);
                        handlers.spawn(async move { pipeline.handle_event(&payload).await });
                    }
                    None => break "event stream closed",
                },

                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    self.reap(joined);
                },

                Some(_) = self.shutdown_rx.recv() => {
                    break "shutdown requested";
                }
            }
        };

        logging::log_shutdown(ServiceId::current(), reason);
        drop(events);
        self.drain(&mut handlers).await;

        let _ = self.cancel_tx.send(true);
        for (name, handle) in [("metrics reporter", reporter), ("expiry sweeper", sweeper)] {
            if let Err(e) = handle.await {
                service_warn!("{} ended abnormally: {}", name, e);
            }
        }

        let snapshot = self.metrics().snapshot();
        service_info!(
            tasks_processed = snapshot.tasks_processed,
            tasks_dropped = snapshot.tasks_dropped,
            tasks_failed = snapshot.tasks_failed,
            proposals_delivered = snapshot.proposals_delivered,
            error_count = snapshot.error_count,
            "🏁 Orchestrator stopped"
        );
        Ok(())
    }

    /// Final counters, usable after `run` returns
    pub fn final_snapshot(&self) -> MetricsSnapshot {
        self.metrics().snapshot()
    }

    /// Wait for in-flight handlers up to the shutdown grace, then cancel the rest
    async fn drain(&self, handlers: &mut JoinSet<TaskOutcome>) {
        if handlers.is_empty() {
            return;
        }
        service_debug!(in_flight = handlers.len(), "Draining in-flight task handlers");

        let graceful = timeout(self.config.shutdown_grace, async {
            while let Some(joined) = handlers.join_next().await {
                self.reap(joined);
            }
        })
        .await;

        if graceful.is_err() {
            service_warn!(
                in_flight = handlers.len(),
                grace_ms = self.config.shutdown_grace.as_millis() as u64,
                "Shutdown grace exhausted, cancelling remaining tasks"
            );
            let _ = self.cancel_tx.send(true);
            while let Some(joined) = handlers.join_next().await {
                self.reap(joined);
            }
        }
    }

    fn reap(&self, joined: Result<TaskOutcome, JoinError>) {
        match joined {
            Ok(outcome) => {
                service_debug!(outcome = outcome.label(), "Task handler finished");
            }
            Err(e) if e.is_panic() => {
                let metrics = self.pipeline.metrics();
                metrics.record_error();
                metrics.record_task_failed();
                service_error!(error_kind = "internal", "❌ Task handler panicked: {}", e);
            }
            Err(e) => {
                service_debug!("Task handler aborted: {}", e);
            }
        }
    }
}
