//! Test fixtures and data for orchestrator tests
//!
//! Consistent task events and worker profiles shared by the test suites.

use chrono::Utc;
use orchestrator::types::{Candidate, WorkerProfile};
use shared::{CandidateId, PresenceStatus, TaskCreated, TaskId, TaskLifecycleStatus};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const TASK_1: &'static str = "550e8400-e29b-41d4-a716-446655440001";
    pub const TASK_2: &'static str = "550e8400-e29b-41d4-a716-446655440002";

    pub const WORKER_A: &'static str = "worker-a";
    pub const WORKER_B: &'static str = "worker-b";

    /// Encoded task.created event
    pub fn task_event(task_id: &str, skills: &[&str], lower: f64, upper: f64) -> Vec<u8> {
        TaskCreated {
            task_id: TaskId::new(task_id),
            client_id: None,
            title: format!("Task {task_id}"),
            description: String::new(),
            skill_tags: skills.iter().map(|s| s.to_string()).collect(),
            budget_lower_bound: lower,
            budget_upper_bound: upper,
            repository_url: None,
            status: TaskLifecycleStatus::Open,
            occurred_at: Utc::now(),
        }
        .encode()
        .unwrap()
    }

    /// The go/postgresql task with a 40-80 budget
    pub fn reference_task(task_id: &str) -> Vec<u8> {
        Self::task_event(task_id, &["go", "postgresql"], 40.0, 80.0)
    }

    pub fn candidate(id: &str, skills: &[&str], rate: f64, rating: f64) -> Candidate {
        Candidate {
            id: CandidateId::new(id),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            hourly_rate: rate,
            rating,
        }
    }

    /// A scores 1.0 and B scores 0.37 against the reference task
    pub fn reference_candidates() -> Vec<Candidate> {
        vec![
            Self::candidate(Self::WORKER_A, &["go", "postgresql"], 60.0, 5.0),
            Self::candidate(Self::WORKER_B, &["go"], 200.0, 3.0),
        ]
    }

    pub fn worker(id: &str, skills: &[&str], rate: f64, rating: f64) -> WorkerProfile {
        WorkerProfile {
            user_id: CandidateId::new(id),
            display_name: format!("Worker {id}"),
            skill_tags: skills.iter().map(|s| s.to_string()).collect(),
            hourly_rate: rate,
            rating,
            presence: PresenceStatus::Searching,
            last_active: Utc::now(),
        }
    }

    /// Online and offline go developers at various rates
    pub fn worker_pool() -> Vec<WorkerProfile> {
        let mut offline = Self::worker("worker-offline", &["go", "postgresql"], 60.0, 5.0);
        offline.presence = PresenceStatus::Offline;
        vec![
            Self::worker(Self::WORKER_A, &["go", "postgresql"], 60.0, 5.0),
            Self::worker("worker-c", &["Go"], 50.0, 4.0),
            Self::worker("worker-d", &["postgresql", "python"], 75.0, 3.5),
            Self::worker("worker-pricey", &["go"], 500.0, 5.0),
            Self::worker("worker-react", &["react"], 60.0, 5.0),
            offline,
        ]
    }
}
