//! Test helpers and builder patterns for orchestrator tests
//!
//! The builder wires a real in-process bus and proposal store to a mocked
//! delivery transport, so tests can observe announcements and stored
//! proposals while controlling which deliveries fail.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use orchestrator::services::{InMemoryEventBus, InMemoryProfileStore, InMemoryProposalStore};
use orchestrator::traits::MockDeliveryTransport;
use orchestrator::types::{Candidate, TaskContext, WorkerProfile};
use orchestrator::{
    build_candidate_source, CandidateSource, EventBus, MatchingMetrics, Orchestrator, OrchestratorConfig,
    OrchestratorError, OrchestratorResult, WeightedScorer,
};
use shared::{subjects, CandidateId, MatchProposed, ProposalDelivery};
use tokio::sync::mpsc;

/// Candidate source returning a fixed list, optionally after a delay
pub struct StaticSource {
    candidates: Vec<Candidate>,
    delay: Option<Duration>,
}

impl StaticSource {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates, delay: None }
    }

    pub fn slow(candidates: Vec<Candidate>, delay: Duration) -> Self {
        Self {
            candidates,
            delay: Some(delay),
        }
    }
}

#[async_trait::async_trait]
impl CandidateSource for StaticSource {
    async fn resolve(&self, _task: &TaskContext) -> OrchestratorResult<Vec<Candidate>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Candidate source whose first `failures` lookups are unavailable
pub struct FlakySource {
    candidates: Vec<Candidate>,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakySource {
    pub fn new(candidates: Vec<Candidate>, failures: usize) -> Self {
        Self {
            candidates,
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl CandidateSource for FlakySource {
    async fn resolve(&self, _task: &TaskContext) -> OrchestratorResult<Vec<Candidate>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(OrchestratorError::lookup("index unavailable"));
        }
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Type alias for the orchestrator used across the integration tests
pub type TestOrchestrator = Orchestrator<InMemoryEventBus, InMemoryProposalStore, MockDeliveryTransport>;

/// Built orchestrator plus handles on the services it was given
pub struct TestHarness {
    pub orchestrator: TestOrchestrator,
    pub bus: Arc<InMemoryEventBus>,
    pub store: Arc<InMemoryProposalStore>,
}

/// Builder pattern for creating test orchestrators with sensible defaults
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    source: Option<Arc<dyn CandidateSource>>,
    profiles: Vec<WorkerProfile>,
    transport: Option<MockDeliveryTransport>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: TestHelpers::fast_config(),
            source: None,
            profiles: Vec::new(),
            transport: None,
        }
    }

    /// Adjust the configuration
    pub fn with_config<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut OrchestratorConfig),
    {
        setup(&mut self.config);
        self
    }

    /// Use a fixed candidate list instead of the configured strategy
    pub fn with_candidates(self, candidates: Vec<Candidate>) -> Self {
        self.with_source(Arc::new(StaticSource::new(candidates)))
    }

    pub fn with_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Seed the profile store used by the configured strategy
    pub fn with_profiles(mut self, profiles: Vec<WorkerProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Configure the delivery transport mock with a setup function
    ///
    /// Replaces the default accept-everything transport.
    pub fn with_transport<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut MockDeliveryTransport),
    {
        let mut transport = MockDeliveryTransport::new();
        setup(&mut transport);
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> TestHarness {
        let bus = Arc::new(InMemoryEventBus::new());
        let store = Arc::new(InMemoryProposalStore::new());
        let transport = self.transport.unwrap_or_else(|| {
            let mut transport = MockDeliveryTransport::new();
            transport.expect_deliver().returning(|_| Ok(())).times(0..);
            transport
        });
        let source = self.source.unwrap_or_else(|| {
            build_candidate_source(&self.config, Arc::new(InMemoryProfileStore::from_profiles(self.profiles)))
        });
        let scorer = Arc::new(WeightedScorer::new(self.config.score_weights));

        let orchestrator = Orchestrator::new(
            self.config,
            Arc::clone(&bus),
            Arc::clone(&store),
            Arc::new(transport),
            source,
            scorer,
        )
        .unwrap();

        TestHarness {
            orchestrator,
            bus,
            store,
        }
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for common test operations
pub struct TestHelpers;

impl TestHelpers {
    /// Defaults with short timers so background tasks stay responsive in tests
    pub fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            metrics_interval: Duration::from_millis(50),
            sweep_interval: Duration::from_millis(50),
            task_timeout: Duration::from_secs(2),
            lookup_timeout: Duration::from_secs(1),
            ..OrchestratorConfig::default()
        }
    }

    /// Transport that fails for `failing` and records every accepted candidate
    pub fn recording_transport(
        failing: &'static [&'static str],
    ) -> (Arc<Mutex<Vec<CandidateId>>>, impl FnOnce(&mut MockDeliveryTransport)) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let setup = move |transport: &mut MockDeliveryTransport| {
            transport.expect_deliver().returning(move |delivery: ProposalDelivery| {
                if failing.contains(&delivery.candidate_id.as_str()) {
                    return Err(OrchestratorError::delivery(delivery.proposal_id, "recipient unreachable"));
                }
                sink.lock().unwrap().push(delivery.candidate_id);
                Ok(())
            });
        };
        (delivered, setup)
    }

    /// Sorted copy of the recorded deliveries
    pub fn delivered_ids(delivered: &Arc<Mutex<Vec<CandidateId>>>) -> Vec<String> {
        let mut ids: Vec<String> = delivered.lock().unwrap().iter().map(|c| c.to_string()).collect();
        ids.sort();
        ids
    }

    pub async fn subscribe_announcements(bus: &InMemoryEventBus) -> mpsc::Receiver<Vec<u8>> {
        bus.subscribe(subjects::MATCH_PROPOSED).await.unwrap()
    }

    /// Everything already published on match.proposed
    pub fn drain_announcements(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<MatchProposed> {
        let mut events = Vec::new();
        while let Ok(payload) = rx.try_recv() {
            events.push(MatchProposed::decode(&payload).unwrap());
        }
        events
    }

    /// Poll until `expected` events reached a terminal outcome
    pub async fn wait_for_handled(metrics: &MatchingMetrics, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while metrics.snapshot().tasks_handled() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("events were not handled in time");
    }
}
