//! Service-specific tests
//!
//! One file per in-process service, sharing the fixtures below.


pub mod common {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use shared::{CandidateId, PresenceStatus, ProposalId, ProposalStatus, TaskId};
    use tokio::time::timeout;

    use crate::types::{Proposal, WorkerProfile};

    /// Standard timeout for async operations in tests
    pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

    /// Helper to run async operations with timeout
    pub async fn with_timeout<T, F>(future: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = T>,
    {
        timeout(TEST_TIMEOUT, future).await
    }

    pub fn worker(id: &str, skills: &[&str], rate: f64, rating: f64, presence: PresenceStatus) -> WorkerProfile {
        WorkerProfile {
            user_id: CandidateId::new(id),
            display_name: format!("Worker {id}"),
            skill_tags: skills.iter().map(|s| s.to_string()).collect(),
            hourly_rate: rate,
            rating,
            presence,
            last_active: Utc::now(),
        }
    }

    pub fn proposal(task: &str, candidate: &str, created_at: DateTime<Utc>, ttl_secs: i64) -> Proposal {
        Proposal {
            id: ProposalId::new(),
            task_id: TaskId::new(task),
            candidate_id: CandidateId::new(candidate),
            score: 0.5,
            status: ProposalStatus::Proposed,
            strategy: "skill_match".to_string(),
            created_at,
            expires_at: created_at + chrono::Duration::seconds(ttl_secs),
        }
    }
}
