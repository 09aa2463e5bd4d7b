//! Orchestrator configuration
//!
//! Values are layered: built-in defaults, then `.env` / process environment
//! (`MATCHER_*` variables), then command-line flags applied by the binary.
//!
//! ## Environment variables
//! - `MATCHER_MAX_CONCURRENT_TASKS`, `MATCHER_MAX_PROPOSALS_PER_TASK`
//! - `MATCHER_PROPOSAL_TTL_SECS`, `MATCHER_TASK_TIMEOUT_SECS`, `MATCHER_LOOKUP_TIMEOUT_SECS`
//! - `MATCHER_METRICS_INTERVAL_SECS`, `MATCHER_SWEEP_INTERVAL_SECS`, `MATCHER_SHUTDOWN_GRACE_SECS`
//! - `MATCHER_CANDIDATE_STRATEGY` (`indexed` | `direct`), `MATCHER_DIRECT_TOP_K`
//! - `MATCHER_INDEX_PER_SKILL_LIMIT`, `MATCHER_DUPLICATE_WINDOW_SECS`
//! - `MATCHER_DELIVERY_CHANNELS` (comma separated), `MATCHER_DELIVERY_RETRY_COUNT`
//! - `MATCHER_WEIGHT_SKILL`, `MATCHER_WEIGHT_BUDGET`, `MATCHER_WEIGHT_RATING`

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use shared::{DeliveryChannel, DeliveryOptions};

use crate::core::scorer::ScoreWeights;
use crate::error::{OrchestratorError, OrchestratorResult};

const ENV_PREFIX: &str = "MATCHER_";

/// How candidates are resolved for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidateStrategy {
    /// Fast skill index with budget pre-filtering
    #[default]
    Indexed,
    /// Direct filtered query against the profile store, capped to a small top-K
    Direct,
}

impl FromStr for CandidateStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "indexed" | "index" | "fast" => Ok(CandidateStrategy::Indexed),
            "direct" | "query" => Ok(CandidateStrategy::Direct),
            other => Err(format!("Unknown candidate strategy: {other}")),
        }
    }
}

impl fmt::Display for CandidateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateStrategy::Indexed => write!(f, "indexed"),
            CandidateStrategy::Direct => write!(f, "direct"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Global bound on tasks processed concurrently
    pub max_concurrent_tasks: usize,
    /// Top-N candidates that receive proposals per task
    pub max_proposals_per_task: usize,
    /// Lifetime of a proposal before the sweep expires it
    pub proposal_ttl: Duration,
    /// End-to-end budget for one task's matching attempt
    pub task_timeout: Duration,
    /// Budget for a single candidate resolution call
    pub lookup_timeout: Duration,
    pub metrics_interval: Duration,
    pub sweep_interval: Duration,
    /// How long shutdown waits for in-flight tasks before cancelling them
    pub shutdown_grace: Duration,
    pub candidate_strategy: CandidateStrategy,
    pub direct_top_k: usize,
    pub index_per_skill_limit: usize,
    pub latency_sample_capacity: usize,
    /// Suppress re-processing of a task id seen within this window
    pub duplicate_window: Option<Duration>,
    pub delivery_options: DeliveryOptions,
    pub score_weights: ScoreWeights,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 100,
            max_proposals_per_task: 20,
            proposal_ttl: Duration::from_secs(5 * 60),
            task_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(5),
            metrics_interval: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
            candidate_strategy: CandidateStrategy::Indexed,
            direct_top_k: 5,
            index_per_skill_limit: 50,
            latency_sample_capacity: 10_000,
            duplicate_window: None,
            delivery_options: DeliveryOptions::default(),
            score_weights: ScoreWeights::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from `.env` and the process environment on top of defaults
    pub fn from_env() -> OrchestratorResult<Self> {
        // Silently ignored when no .env file is present
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> OrchestratorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(v) = parse_var::<usize>(&get, "MAX_CONCURRENT_TASKS")? {
            config.max_concurrent_tasks = v;
        }
        if let Some(v) = parse_var::<usize>(&get, "MAX_PROPOSALS_PER_TASK")? {
            config.max_proposals_per_task = v;
        }
        if let Some(v) = parse_var::<u64>(&get, "PROPOSAL_TTL_SECS")? {
            config.proposal_ttl = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&get, "TASK_TIMEOUT_SECS")? {
            config.task_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&get, "LOOKUP_TIMEOUT_SECS")? {
            config.lookup_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&get, "METRICS_INTERVAL_SECS")? {
            config.metrics_interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&get, "SWEEP_INTERVAL_SECS")? {
            config.sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&get, "SHUTDOWN_GRACE_SECS")? {
            config.shutdown_grace = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<CandidateStrategy>(&get, "CANDIDATE_STRATEGY")? {
            config.candidate_strategy = v;
        }
        if let Some(v) = parse_var::<usize>(&get, "DIRECT_TOP_K")? {
            config.direct_top_k = v;
        }
        if let Some(v) = parse_var::<usize>(&get, "INDEX_PER_SKILL_LIMIT")? {
            config.index_per_skill_limit = v;
        }
        if let Some(v) = parse_var::<u64>(&get, "DUPLICATE_WINDOW_SECS")? {
            config.duplicate_window = (v > 0).then(|| Duration::from_secs(v));
        }
        if let Some(raw) = get("DELIVERY_CHANNELS") {
            config.delivery_options.preferred_channels = parse_channels(&raw)?;
        }
        if let Some(v) = parse_var::<u32>(&get, "DELIVERY_RETRY_COUNT")? {
            config.delivery_options.retry_count = v;
        }
        if let Some(v) = parse_var::<f64>(&get, "WEIGHT_SKILL")? {
            config.score_weights.skill = v;
        }
        if let Some(v) = parse_var::<f64>(&get, "WEIGHT_BUDGET")? {
            config.score_weights.budget = v;
        }
        if let Some(v) = parse_var::<f64>(&get, "WEIGHT_RATING")? {
            config.score_weights.rating = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(OrchestratorError::config("max_concurrent_tasks must be at least 1"));
        }
        if self.max_proposals_per_task == 0 {
            return Err(OrchestratorError::config("max_proposals_per_task must be at least 1"));
        }
        if self.direct_top_k == 0 || self.index_per_skill_limit == 0 {
            return Err(OrchestratorError::config("candidate limits must be at least 1"));
        }
        if self.latency_sample_capacity == 0 {
            return Err(OrchestratorError::config("latency_sample_capacity must be at least 1"));
        }

        let durations = [
            ("proposal_ttl", self.proposal_ttl),
            ("task_timeout", self.task_timeout),
            ("lookup_timeout", self.lookup_timeout),
            ("metrics_interval", self.metrics_interval),
            ("sweep_interval", self.sweep_interval),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(OrchestratorError::config(format!("{name} must be greater than zero")));
            }
        }

        if chrono::Duration::from_std(self.proposal_ttl).is_err() {
            return Err(OrchestratorError::config("proposal_ttl is out of range"));
        }

        self.score_weights.validate()
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, name: &str) -> OrchestratorResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| OrchestratorError::config(format!("{ENV_PREFIX}{name}={raw}: {e}"))),
    }
}

/// Parse a comma separated channel list such as `websocket,push`
pub fn parse_channels(raw: &str) -> OrchestratorResult<Vec<DeliveryChannel>> {
    let channels = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| part.parse::<DeliveryChannel>().map_err(OrchestratorError::config))
        .collect::<OrchestratorResult<Vec<_>>>()?;

    if channels.is_empty() {
        return Err(OrchestratorError::config("delivery channel list must not be empty"));
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_tasks, 100);
        assert_eq!(config.max_proposals_per_task, 20);
        assert_eq!(config.proposal_ttl, Duration::from_secs(300));
        assert_eq!(config.task_timeout, Duration::from_secs(30));
        assert_eq!(config.direct_top_k, 5);
        assert_eq!(config.duplicate_window, None);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("MATCHER_MAX_CONCURRENT_TASKS", "8"),
            ("MATCHER_CANDIDATE_STRATEGY", "direct"),
            ("MATCHER_PROPOSAL_TTL_SECS", "60"),
            ("MATCHER_DUPLICATE_WINDOW_SECS", "120"),
            ("MATCHER_SHUTDOWN_GRACE_SECS", "0"),
            ("MATCHER_DELIVERY_CHANNELS", "push, email"),
        ]))
        .unwrap();

        assert_eq!(config.max_concurrent_tasks, 8);
        assert_eq!(config.candidate_strategy, CandidateStrategy::Direct);
        assert_eq!(config.proposal_ttl, Duration::from_secs(60));
        assert_eq!(config.duplicate_window, Some(Duration::from_secs(120)));
        // zero grace cancels in-flight work immediately
        assert_eq!(config.shutdown_grace, Duration::ZERO);
        assert_eq!(
            config.delivery_options.preferred_channels,
            vec![DeliveryChannel::Push, DeliveryChannel::Email]
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = OrchestratorConfig::from_lookup(lookup(&[("MATCHER_MAX_CONCURRENT_TASKS", "lots")])).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigurationError { .. }));

        let err = OrchestratorConfig::from_lookup(lookup(&[("MATCHER_MAX_PROPOSALS_PER_TASK", "0")])).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigurationError { .. }));

        let err = OrchestratorConfig::from_lookup(lookup(&[("MATCHER_WEIGHT_SKILL", "0.9")])).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigurationError { .. }));
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("INDEXED".parse::<CandidateStrategy>(), Ok(CandidateStrategy::Indexed));
        assert_eq!("direct".parse::<CandidateStrategy>(), Ok(CandidateStrategy::Direct));
        assert!("random".parse::<CandidateStrategy>().is_err());
    }
}
