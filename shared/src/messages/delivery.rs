//! Orchestrator → notification transport delivery requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{SharedError, SharedResult};
use crate::types::{CandidateId, DeliveryChannel, ProposalId, TaskId};

/// What the worker sees when the proposal reaches them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub score: f64,
    pub expires_at: DateTime<Utc>,
}

/// How the transport should try to reach the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    pub preferred_channels: Vec<DeliveryChannel>,
    pub allow_fallback: bool,
    pub retry_count: u32,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            preferred_channels: vec![DeliveryChannel::Websocket, DeliveryChannel::Push],
            allow_fallback: true,
            retry_count: 3,
        }
    }
}

/// A single proposal delivery request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDelivery {
    pub proposal_id: ProposalId,
    pub task_id: TaskId,
    pub candidate_id: CandidateId,
    pub payload: DeliveryPayload,
    pub options: DeliveryOptions,
}

impl ProposalDelivery {
    pub fn encode(&self) -> SharedResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SharedError::SerializationError { message: e.to_string() })
    }

    pub fn decode(payload: &[u8]) -> SharedResult<Self> {
        serde_json::from_slice(payload).map_err(|e| SharedError::malformed("proposal.delivery", e.to_string()))
    }
}
