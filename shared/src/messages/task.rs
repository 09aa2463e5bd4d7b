//! Task service → Orchestrator events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{ClientId, TaskId, TaskLifecycleStatus};

/// Published once per task when the task service persists a new task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub task_id: TaskId,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skill_tags: Vec<String>,
    #[serde(default)]
    pub budget_lower_bound: f64,
    #[serde(default)]
    pub budget_upper_bound: f64,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub status: TaskLifecycleStatus,
    #[serde(default = "Utc::now")]
    pub occurred_at: DateTime<Utc>,
}

impl TaskCreated {
    const EVENT: &'static str = "task.created";

    /// Decode and validate a payload received from the task.created subject
    pub fn decode(payload: &[u8]) -> SharedResult<Self> {
        let event: TaskCreated =
            serde_json::from_slice(payload).map_err(|e| SharedError::malformed(Self::EVENT, e.to_string()))?;
        event.validate()?;
        Ok(event)
    }

    pub fn encode(&self) -> SharedResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SharedError::SerializationError { message: e.to_string() })
    }

    /// Check the invariants the matching pipeline relies on
    pub fn validate(&self) -> SharedResult<()> {
        if self.task_id.is_empty() {
            return Err(SharedError::malformed(Self::EVENT, "task_id must not be empty"));
        }

        let (lower, upper) = (self.budget_lower_bound, self.budget_upper_bound);
        if !lower.is_finite() || !upper.is_finite() {
            return Err(SharedError::malformed(Self::EVENT, "budget bounds must be finite"));
        }
        if lower < 0.0 || upper < 0.0 {
            return Err(SharedError::malformed(
                Self::EVENT,
                format!("budget bounds must not be negative ({lower}, {upper})"),
            ));
        }
        if lower > upper {
            return Err(SharedError::malformed(
                Self::EVENT,
                format!("budget lower bound {lower} exceeds upper bound {upper}"),
            ));
        }

        Ok(())
    }
}
