//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Global service ID singleton - set once at startup
static SERVICE_ID: OnceLock<ServiceId> = OnceLock::new();

/// Identity of the platform service emitting logs and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceId {
    Orchestrator,
    TaskService,
    UserService,
    DeliveryService,
}

impl ServiceId {
    /// Initialize the global service ID for the orchestrator
    pub fn init_orchestrator() -> &'static ServiceId {
        SERVICE_ID.get_or_init(|| ServiceId::Orchestrator)
    }

    /// Initialize the global service ID with an explicit value
    pub fn init(id: ServiceId) -> &'static ServiceId {
        SERVICE_ID.get_or_init(|| id)
    }

    /// Get the global service ID, falling back to the orchestrator
    pub fn current() -> &'static ServiceId {
        SERVICE_ID.get().unwrap_or(&ServiceId::Orchestrator)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceId::Orchestrator => write!(f, "orchestrator"),
            ServiceId::TaskService => write!(f, "task-service"),
            ServiceId::UserService => write!(f, "user-service"),
            ServiceId::DeliveryService => write!(f, "delivery-service"),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a task published by a client
    TaskId
);
string_id!(
    /// Identifier of the client that owns a task
    ClientId
);
string_id!(
    /// Identifier of a worker considered for a task
    CandidateId
);

/// Unique identifier for proposals, generated at creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a task record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLifecycleStatus {
    #[default]
    Open,
    InProgress,
    Completed,
    Cancelled,
}

/// Presence of a worker as reported by the presence service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Searching,
    Idle,
    Busy,
    #[default]
    Offline,
}

impl PresenceStatus {
    /// Workers that are searching or idle can receive proposals
    pub fn is_online(&self) -> bool {
        matches!(self, PresenceStatus::Searching | PresenceStatus::Idle)
    }
}

/// Status of a proposal record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    #[default]
    Proposed,
    Accepted,
    Rejected,
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Proposed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Proposed => "proposed",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channels the notification transport may use to reach a worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    Websocket,
    Push,
    Email,
}

impl std::str::FromStr for DeliveryChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "websocket" | "ws" => Ok(DeliveryChannel::Websocket),
            "push" => Ok(DeliveryChannel::Push),
            "email" => Ok(DeliveryChannel::Email),
            other => Err(format!("Unknown delivery channel: {other}")),
        }
    }
}
