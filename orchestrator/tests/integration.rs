//! End-to-end tests for the matching orchestrator
//!
//! Tasks flow through the real pipeline, in-process bus and proposal store;
//! only the delivery transport (and sometimes the candidate source) is mocked.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use orchestrator::services::InMemoryProposalStore;
use orchestrator::traits::{MockCandidateSource, MockDeliveryTransport, MockEventBus};
use orchestrator::{
    CandidateStrategy, EventBus, ErrorKind, MatchingStage, Orchestrator, OrchestratorError, ProposalStore,
    TaskOutcome, WeightedScorer,
};
use shared::{subjects, ProposalStatus, TaskId};

mod common;
use common::{FlakySource, OrchestratorBuilder, StaticSource, TestFixtures, TestHelpers};

/// A payload that cannot be decoded fails alone and is counted once
#[tokio::test]
async fn test_malformed_payload_is_isolated() {
    // Arrange
    let harness = OrchestratorBuilder::new().with_candidates(vec![]).build();

    // Act
    let outcome = harness.orchestrator.handle_event(b"{ definitely not json").await;

    // Assert
    match outcome {
        TaskOutcome::Failed { task_id, stage, error } => {
            assert!(task_id.is_none());
            assert_eq!(stage, MatchingStage::Received);
            assert_eq!(error.kind(), ErrorKind::MalformedInput);
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let next = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;
    assert!(next.is_completed());

    let snapshot = harness.orchestrator.metrics().snapshot();
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(snapshot.tasks_failed, 1);
    assert_eq!(snapshot.tasks_processed, 1);
}

/// A failed delivery to one candidate does not affect the other
#[tokio::test]
async fn test_partial_delivery_is_isolated_per_candidate() {
    // Arrange
    let (delivered, transport) = TestHelpers::recording_transport(&[TestFixtures::WORKER_B]);
    let harness = OrchestratorBuilder::new()
        .with_candidates(TestFixtures::reference_candidates())
        .with_transport(transport)
        .build();
    let mut announcements = TestHelpers::subscribe_announcements(&harness.bus).await;

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    match outcome {
        TaskOutcome::Completed {
            candidates,
            created,
            delivered,
            failed,
            ..
        } => {
            assert_eq!(candidates, 2);
            assert_eq!(created, 2);
            assert_eq!(delivered, 1);
            assert_eq!(failed, 1);
        }
        other => panic!("expected completion, got {other:?}"),
    }

    let events = TestHelpers::drain_announcements(&mut announcements);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].candidate_id.as_str(), TestFixtures::WORKER_A);
    assert!((events[0].score - 1.0).abs() < 1e-9);
    assert_eq!(events[0].strategy, "skill_match");
    assert_eq!(TestHelpers::delivered_ids(&delivered), vec![TestFixtures::WORKER_A]);

    let snapshot = harness.orchestrator.metrics().snapshot();
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(snapshot.proposals_created, 2);
    assert_eq!(snapshot.proposals_delivered, 1);
    assert_eq!(snapshot.tasks_processed, 1);

    // Both proposals are recorded; the undelivered one stays until it expires
    let stored = harness.store.list_for_task(&TaskId::new(TestFixtures::TASK_1)).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].candidate_id.as_str(), TestFixtures::WORKER_A);
    assert!((stored[1].score - 0.37).abs() < 1e-9);
    assert!(stored.iter().all(|p| p.status == ProposalStatus::Proposed));
}

/// Only the top N receive proposals; equal scores are ordered by candidate id
#[tokio::test]
async fn test_top_n_truncation_breaks_ties_by_id() {
    // Arrange
    let candidates = ["w-3", "w-1", "w-4", "w-2"]
        .iter()
        .map(|id| TestFixtures::candidate(id, &["go", "postgresql"], 60.0, 4.0))
        .collect();
    let (delivered, transport) = TestHelpers::recording_transport(&[]);
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.max_proposals_per_task = 2)
        .with_candidates(candidates)
        .with_transport(transport)
        .build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    assert!(matches!(outcome, TaskOutcome::Completed { candidates: 4, delivered: 2, .. }));
    assert_eq!(TestHelpers::delivered_ids(&delivered), vec!["w-1", "w-2"]);
    assert_eq!(harness.store.len().await, 2);
}

/// With every slot busy, a new task is dropped rather than queued
#[tokio::test]
async fn test_saturation_drops_excess_tasks() {
    // Arrange
    let source = StaticSource::slow(
        vec![TestFixtures::candidate(TestFixtures::WORKER_A, &["go"], 60.0, 5.0)],
        Duration::from_millis(200),
    );
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.max_concurrent_tasks = 1)
        .with_source(Arc::new(source))
        .build();
    let orchestrator = &harness.orchestrator;
    let first_event = TestFixtures::reference_task(TestFixtures::TASK_1);
    let second_event = TestFixtures::reference_task(TestFixtures::TASK_2);

    // Act
    let (first, second) = tokio::join!(orchestrator.handle_event(&first_event), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.handle_event(&second_event).await
    });

    // Assert
    assert!(first.is_completed());
    match second {
        TaskOutcome::Dropped { task_id } => assert_eq!(task_id.as_str(), TestFixtures::TASK_2),
        other => panic!("expected drop, got {other:?}"),
    }

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_dropped, 1);
    assert_eq!(snapshot.tasks_processed, 1);
    assert_eq!(orchestrator.admission().active_slots(), 0);
    assert!(!orchestrator.admission().is_active(&TaskId::new(TestFixtures::TASK_1)));
}

/// The sweep expires pending proposals but leaves accepted ones alone
#[tokio::test]
async fn test_expiry_sweep_skips_accepted_proposals() {
    // Arrange
    let harness = OrchestratorBuilder::new()
        .with_candidates(TestFixtures::reference_candidates())
        .build();
    harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;
    let proposals = harness.orchestrator.proposals();
    let stored = harness.store.list_for_task(&TaskId::new(TestFixtures::TASK_1)).await.unwrap();
    let (accepted, pending) = (stored[0].id, stored[1].id);
    assert!(proposals.accept(accepted).await.unwrap());

    // Act
    let later = Utc::now() + chrono::Duration::seconds(301);
    let expired = proposals.sweep_expired(later).await.unwrap();

    // Assert
    assert_eq!(expired, 1);
    assert_eq!(
        harness.store.get(accepted).await.unwrap().unwrap().status,
        ProposalStatus::Accepted
    );
    assert_eq!(
        harness.store.get(pending).await.unwrap().unwrap().status,
        ProposalStatus::Expired
    );
    assert_eq!(proposals.sweep_expired(later).await.unwrap(), 0);
    assert!(!proposals.reject(pending).await.unwrap());
}

/// Direct strategy: online workers sharing a skill with a rate inside the budget
#[tokio::test]
async fn test_direct_strategy_uses_profile_store() {
    // Arrange
    let (delivered, transport) = TestHelpers::recording_transport(&[]);
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.candidate_strategy = CandidateStrategy::Direct)
        .with_profiles(TestFixtures::worker_pool())
        .with_transport(transport)
        .build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    assert!(matches!(outcome, TaskOutcome::Completed { candidates: 3, delivered: 3, .. }));
    assert_eq!(
        TestHelpers::delivered_ids(&delivered),
        vec!["worker-a", "worker-c", "worker-d"]
    );
}

/// Indexed strategy: skill index lookups with the widened budget pre-filter
#[tokio::test]
async fn test_indexed_strategy_uses_skill_index() {
    // Arrange
    let (delivered, transport) = TestHelpers::recording_transport(&[]);
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.candidate_strategy = CandidateStrategy::Indexed)
        .with_profiles(TestFixtures::worker_pool())
        .with_transport(transport)
        .build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    assert!(matches!(outcome, TaskOutcome::Completed { candidates: 3, .. }));
    assert_eq!(
        TestHelpers::delivered_ids(&delivered),
        vec!["worker-a", "worker-c", "worker-d"]
    );
}

/// No candidates is a normal completion, not an error
#[tokio::test]
async fn test_zero_candidates_completes_without_proposals() {
    // Arrange
    let harness = OrchestratorBuilder::new()
        .with_candidates(vec![])
        .with_transport(|t| {
            t.expect_deliver().times(0);
        })
        .build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::task_event(TestFixtures::TASK_1, &["cobol"], 10.0, 20.0))
        .await;

    // Assert
    assert!(matches!(outcome, TaskOutcome::Completed { candidates: 0, created: 0, .. }));
    let snapshot = harness.orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_processed, 1);
    assert_eq!(snapshot.error_count, 0);
    assert!(harness.store.is_empty().await);
}

/// Candidates that cannot be scored are skipped without failing the task
#[tokio::test]
async fn test_unscorable_candidate_is_skipped() {
    // Arrange
    let mut candidates = TestFixtures::reference_candidates();
    candidates[1].rating = f64::NAN;
    let harness = OrchestratorBuilder::new().with_candidates(candidates).build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    assert!(matches!(outcome, TaskOutcome::Completed { candidates: 2, delivered: 1, failed: 0, .. }));
    assert_eq!(harness.orchestrator.metrics().error_count(), 0);
}

/// A failed match announcement leaves the delivered proposal and the task intact
#[tokio::test]
async fn test_announce_failure_is_best_effort() {
    // Arrange
    let mut bus = MockEventBus::new();
    bus.expect_publish()
        .withf(|subject: &str, _payload: &Vec<u8>| subject == subjects::MATCH_PROPOSED)
        .times(1)
        .returning(|subject: &str, _payload: Vec<u8>| Err(OrchestratorError::publish(subject, "broker unavailable")));
    let (delivered, setup_transport) = TestHelpers::recording_transport(&[]);
    let mut transport = MockDeliveryTransport::new();
    setup_transport(&mut transport);

    let store = Arc::new(InMemoryProposalStore::new());
    let config = TestHelpers::fast_config();
    let orchestrator = Orchestrator::new(
        config.clone(),
        Arc::new(bus),
        Arc::clone(&store),
        Arc::new(transport),
        Arc::new(StaticSource::new(vec![TestFixtures::candidate(
            TestFixtures::WORKER_A,
            &["go"],
            60.0,
            5.0,
        )])),
        Arc::new(WeightedScorer::new(config.score_weights)),
    )
    .unwrap();

    // Act
    let outcome = orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    match outcome {
        TaskOutcome::Completed {
            created, delivered, failed, ..
        } => {
            assert_eq!(created, 1);
            assert_eq!(delivered, 1);
            assert_eq!(failed, 0);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(TestHelpers::delivered_ids(&delivered), vec![TestFixtures::WORKER_A]);

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.notification_failures, 1);
    assert_eq!(snapshot.error_count, 0);
    assert_eq!(snapshot.proposals_delivered, 1);
    assert_eq!(snapshot.tasks_processed, 1);

    let stored = store.snapshot().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, ProposalStatus::Proposed);
}

/// Redelivered task ids inside the window are suppressed
#[tokio::test]
async fn test_duplicate_window_suppresses_redelivery() {
    // Arrange
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.duplicate_window = Some(Duration::from_secs(60)))
        .with_candidates(vec![TestFixtures::candidate(TestFixtures::WORKER_A, &["go"], 60.0, 5.0)])
        .build();
    let event = TestFixtures::reference_task(TestFixtures::TASK_1);

    // Act
    let first = harness.orchestrator.handle_event(&event).await;
    let second = harness.orchestrator.handle_event(&event).await;

    // Assert
    assert!(first.is_completed());
    assert!(matches!(second, TaskOutcome::Duplicate { .. }));
    assert_eq!(harness.orchestrator.metrics().snapshot().duplicates_suppressed, 1);
    assert_eq!(harness.store.len().await, 1);
}

/// Without a duplicate window each delivery is matched again
#[tokio::test]
async fn test_redelivery_without_window_is_reprocessed() {
    let harness = OrchestratorBuilder::new()
        .with_candidates(vec![TestFixtures::candidate(TestFixtures::WORKER_A, &["go"], 60.0, 5.0)])
        .build();
    let event = TestFixtures::reference_task(TestFixtures::TASK_1);

    assert!(harness.orchestrator.handle_event(&event).await.is_completed());
    assert!(harness.orchestrator.handle_event(&event).await.is_completed());
    assert_eq!(harness.store.len().await, 2);
}

/// A task dropped under saturation is matched when it is redelivered
#[tokio::test]
async fn test_dropped_task_is_accepted_on_redelivery() {
    // Arrange
    let source = StaticSource::slow(
        vec![TestFixtures::candidate(TestFixtures::WORKER_A, &["go"], 60.0, 5.0)],
        Duration::from_millis(200),
    );
    let harness = OrchestratorBuilder::new()
        .with_config(|c| {
            c.max_concurrent_tasks = 1;
            c.duplicate_window = Some(Duration::from_secs(60));
        })
        .with_source(Arc::new(source))
        .build();
    let orchestrator = &harness.orchestrator;
    let first_event = TestFixtures::reference_task(TestFixtures::TASK_1);
    let second_event = TestFixtures::reference_task(TestFixtures::TASK_2);

    let (first, second) = tokio::join!(orchestrator.handle_event(&first_event), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        orchestrator.handle_event(&second_event).await
    });
    assert!(first.is_completed());
    assert!(matches!(second, TaskOutcome::Dropped { .. }));

    // Act
    let redelivered = orchestrator.handle_event(&second_event).await;
    let completed_again = orchestrator.handle_event(&first_event).await;

    // Assert
    match redelivered {
        TaskOutcome::Completed { task_id, delivered, .. } => {
            assert_eq!(task_id.as_str(), TestFixtures::TASK_2);
            assert_eq!(delivered, 1);
        }
        other => panic!("expected redelivery to complete, got {other:?}"),
    }
    assert!(matches!(completed_again, TaskOutcome::Duplicate { .. }));

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_processed, 2);
    assert_eq!(snapshot.tasks_dropped, 1);
    assert_eq!(snapshot.duplicates_suppressed, 1);
    assert_eq!(harness.store.len().await, 2);
}

/// A task that failed on a transient lookup error is matched when redelivered
#[tokio::test]
async fn test_failed_task_is_accepted_on_redelivery() {
    // Arrange
    let source = FlakySource::new(vec![TestFixtures::candidate(TestFixtures::WORKER_A, &["go"], 60.0, 5.0)], 1);
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.duplicate_window = Some(Duration::from_secs(60)))
        .with_source(Arc::new(source))
        .build();
    let event = TestFixtures::reference_task(TestFixtures::TASK_1);

    // Act
    let first = harness.orchestrator.handle_event(&event).await;
    let second = harness.orchestrator.handle_event(&event).await;

    // Assert
    assert!(matches!(first, TaskOutcome::Failed { .. }));
    assert!(second.is_completed());
    let snapshot = harness.orchestrator.metrics().snapshot();
    assert_eq!(snapshot.tasks_failed, 1);
    assert_eq!(snapshot.tasks_processed, 1);
    assert_eq!(snapshot.duplicates_suppressed, 0);
    assert_eq!(harness.store.len().await, 1);
}

/// A task exceeding its budget fails at the stage it reached
#[tokio::test]
async fn test_task_timeout_reports_stage() {
    // Arrange
    let source = StaticSource::slow(TestFixtures::reference_candidates(), Duration::from_millis(500));
    let harness = OrchestratorBuilder::new()
        .with_config(|c| c.task_timeout = Duration::from_millis(50))
        .with_source(Arc::new(source))
        .build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    match outcome {
        TaskOutcome::Failed { task_id, stage, error } => {
            assert_eq!(task_id, Some(TaskId::new(TestFixtures::TASK_1)));
            assert_eq!(stage, MatchingStage::Admitted);
            assert!(matches!(error, OrchestratorError::TaskTimeout { .. }));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(harness.orchestrator.admission().active_slots(), 0);
}

/// A failing candidate lookup fails the task as transient
#[tokio::test]
async fn test_lookup_failure_fails_task() {
    // Arrange
    let mut source = MockCandidateSource::new();
    source
        .expect_resolve()
        .returning(|_| Err(OrchestratorError::lookup("index unavailable")));
    source.expect_name().return_const("mock");
    let harness = OrchestratorBuilder::new().with_source(Arc::new(source)).build();

    // Act
    let outcome = harness
        .orchestrator
        .handle_event(&TestFixtures::reference_task(TestFixtures::TASK_1))
        .await;

    // Assert
    match outcome {
        TaskOutcome::Failed { stage, error, .. } => {
            assert_eq!(stage, MatchingStage::Admitted);
            assert_eq!(error.kind(), ErrorKind::Transient);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    let snapshot = harness.orchestrator.metrics().snapshot();
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(snapshot.tasks_failed, 1);
}

/// The consumer loop handles bus events concurrently and stops on request
#[tokio::test]
async fn test_run_loop_consumes_bus_and_shuts_down() {
    // Arrange
    let mut harness = OrchestratorBuilder::new()
        .with_candidates(TestFixtures::reference_candidates())
        .build();
    harness.orchestrator.initialize().await.unwrap();
    let mut announcements = TestHelpers::subscribe_announcements(&harness.bus).await;

    for task in [TestFixtures::TASK_1, TestFixtures::TASK_2] {
        harness
            .bus
            .publish(subjects::TASK_CREATED, TestFixtures::reference_task(task))
            .await
            .unwrap();
    }
    harness
        .bus
        .publish(subjects::TASK_CREATED, b"garbage".to_vec())
        .await
        .unwrap();

    let metrics = harness.orchestrator.metrics();
    let shutdown = harness.orchestrator.get_shutdown_sender();
    tokio::spawn(async move {
        TestHelpers::wait_for_handled(&metrics, 3).await;
        shutdown.send(()).await.unwrap();
    });

    // Act
    let result = tokio::time::timeout(Duration::from_secs(5), harness.orchestrator.run()).await;

    // Assert
    assert!(result.expect("run loop did not stop").is_ok());
    let snapshot = harness.orchestrator.final_snapshot();
    assert_eq!(snapshot.tasks_processed, 2);
    assert_eq!(snapshot.tasks_failed, 1);
    assert_eq!(snapshot.proposals_delivered, 4);
    assert_eq!(TestHelpers::drain_announcements(&mut announcements).len(), 4);
    assert_eq!(harness.orchestrator.admission().active_slots(), 0);
}

/// Shutdown cancels tasks still running once the grace period is over
#[tokio::test]
async fn test_shutdown_cancels_tasks_past_grace() {
    // Arrange
    let source = StaticSource::slow(TestFixtures::reference_candidates(), Duration::from_secs(5));
    let mut harness = OrchestratorBuilder::new()
        .with_config(|c| {
            c.task_timeout = Duration::from_secs(10);
            c.lookup_timeout = Duration::from_secs(10);
            c.shutdown_grace = Duration::from_millis(50);
        })
        .with_source(Arc::new(source))
        .build();
    harness.orchestrator.initialize().await.unwrap();
    harness
        .bus
        .publish(subjects::TASK_CREATED, TestFixtures::reference_task(TestFixtures::TASK_1))
        .await
        .unwrap();

    let shutdown = harness.orchestrator.get_shutdown_sender();
    tokio::spawn(async move {
        // the handler is stuck in candidate resolution by now
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.send(()).await.unwrap();
    });

    // Act
    let result = tokio::time::timeout(Duration::from_secs(2), harness.orchestrator.run()).await;

    // Assert
    assert!(result.expect("shutdown waited for the full task budget").is_ok());
    let snapshot = harness.orchestrator.final_snapshot();
    assert_eq!(snapshot.tasks_failed, 1);
    assert_eq!(snapshot.error_count, 1);
    assert_eq!(snapshot.tasks_processed, 0);
    assert_eq!(harness.orchestrator.admission().active_slots(), 0);
    assert!(!harness
        .orchestrator
        .admission()
        .is_active(&TaskId::new(TestFixtures::TASK_1)));
    assert_eq!(harness.store.len().await, 0);
}
