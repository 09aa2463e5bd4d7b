//! Orchestrator → platform match events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{CandidateId, ProposalId, TaskId};

/// Announces that a proposal was delivered to a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProposed {
    pub proposal_id: ProposalId,
    pub task_id: TaskId,
    pub candidate_id: CandidateId,
    pub score: f64,
    pub strategy: String,
    pub occurred_at: DateTime<Utc>,
}

impl MatchProposed {
    pub fn encode(&self) -> SharedResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SharedError::SerializationError { message: e.to_string() })
    }

    pub fn decode(payload: &[u8]) -> SharedResult<Self> {
        serde_json::from_slice(payload).map_err(|e| SharedError::malformed("match.proposed", e.to_string()))
    }
}
