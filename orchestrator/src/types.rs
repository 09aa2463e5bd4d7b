//! Domain types flowing through the matching pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CandidateId, ClientId, PresenceStatus, ProposalId, ProposalStatus, TaskCreated, TaskId};

/// Budget range of a task; `lower <= upper` is enforced when decoding events
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub lower: f64,
    pub upper: f64,
}

impl BudgetRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.lower && rate <= self.upper
    }
}

/// Immutable snapshot of a task taken from its task.created event
#[derive(Debug, Clone, PartialEq)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub client_id: Option<ClientId>,
    pub title: String,
    pub description: String,
    pub skill_tags: Vec<String>,
    pub budget: BudgetRange,
    pub created_at: DateTime<Utc>,
}

impl From<TaskCreated> for TaskContext {
    fn from(event: TaskCreated) -> Self {
        Self {
            task_id: event.task_id,
            client_id: event.client_id,
            title: event.title,
            description: event.description,
            skill_tags: event.skill_tags,
            budget: BudgetRange::new(event.budget_lower_bound, event.budget_upper_bound),
            created_at: event.occurred_at,
        }
    }
}

/// Worker profile as held by the profile/presence store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub user_id: CandidateId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    pub hourly_rate: f64,
    pub rating: f64,
    #[serde(default)]
    pub presence: PresenceStatus,
    #[serde(default = "Utc::now")]
    pub last_active: DateTime<Utc>,
}

impl WorkerProfile {
    /// Best-effort candidate snapshot of this profile
    pub fn to_candidate(&self) -> Candidate {
        Candidate {
            id: self.user_id.clone(),
            skills: self.skill_tags.clone(),
            hourly_rate: self.hourly_rate,
            rating: self.rating,
        }
    }
}

/// Worker considered for a task; may be stale relative to the profile store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub skills: Vec<String>,
    pub hourly_rate: f64,
    pub rating: f64,
}

/// Sub-scores that make up a final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub skill: f64,
    pub budget: f64,
    pub rating: f64,
}

/// Match quality of one candidate for one task, computed per attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate_id: CandidateId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Durable offer of a task to a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub task_id: TaskId,
    pub candidate_id: CandidateId,
    pub score: f64,
    pub status: ProposalStatus,
    pub strategy: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Proposal {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
