//! In-memory worker profile and presence store
//!
//! Serves both the skill index lookup and the filtered direct query, so either
//! candidate strategy can run without external infrastructure.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use shared::{service_info, CandidateId, PresenceStatus};
use tokio::sync::RwLock;

use crate::error::OrchestratorResult;
use crate::traits::{CandidateIndex, ProfileStore};
use crate::types::{BudgetRange, WorkerProfile};

/// Limit applied by the direct query when the caller passes zero
const DEFAULT_QUERY_LIMIT: usize = 50;

#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<CandidateId, WorkerProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_profiles(profiles: Vec<WorkerProfile>) -> Self {
        let map = profiles.into_iter().map(|p| (p.user_id.clone(), p)).collect();
        Self {
            profiles: Arc::new(RwLock::new(map)),
        }
    }

    /// Load a JSON array of worker profiles
    pub async fn load_json(path: impl AsRef<Path>) -> OrchestratorResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path).await?;
        let profiles: Vec<WorkerProfile> = serde_json::from_slice(&raw)?;
        service_info!(count = profiles.len(), path = %path.display(), "👥 Loaded worker profiles");
        Ok(Self::from_profiles(profiles))
    }

    pub async fn upsert(&self, profile: WorkerProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.user_id.clone(), profile);
    }

    /// Update a worker's presence; `false` when the worker is unknown
    pub async fn set_presence(&self, id: &CandidateId, presence: PresenceStatus) -> bool {
        let mut profiles = self.profiles.write().await;
        match profiles.get_mut(id) {
            Some(profile) => {
                profile.presence = presence;
                profile.last_active = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

fn has_skill(profile: &WorkerProfile, skill: &str) -> bool {
    profile.skill_tags.iter().any(|s| s.eq_ignore_ascii_case(skill))
}

fn by_rating_then_activity(a: &WorkerProfile, b: &WorkerProfile) -> Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.last_active.cmp(&a.last_active))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[async_trait::async_trait]
impl CandidateIndex for InMemoryProfileStore {
    async fn ids_for_skill(&self, skill: &str, limit: usize) -> OrchestratorResult<Vec<CandidateId>> {
        let profiles = self.profiles.read().await;
        let mut online: Vec<&WorkerProfile> = profiles
            .values()
            .filter(|p| p.presence.is_online() && has_skill(p, skill))
            .collect();
        online.sort_by(|a, b| by_rating_then_activity(a, b));
        Ok(online.into_iter().take(limit).map(|p| p.user_id.clone()).collect())
    }

    async fn profile(&self, id: &CandidateId) -> OrchestratorResult<Option<WorkerProfile>> {
        Ok(self.profiles.read().await.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find_matching(
        &self,
        skills: &[String],
        budget: BudgetRange,
        limit: usize,
    ) -> OrchestratorResult<Vec<WorkerProfile>> {
        let limit = if limit == 0 { DEFAULT_QUERY_LIMIT } else { limit };
        let unconstrained_budget = budget.upper <= 0.0;

        let profiles = self.profiles.read().await;
        let mut matching: Vec<WorkerProfile> = profiles
            .values()
            .filter(|p| p.presence.is_online())
            .filter(|p| skills.is_empty() || skills.iter().any(|s| has_skill(p, s)))
            .filter(|p| unconstrained_budget || budget.contains(p.hourly_rate))
            .cloned()
            .collect();

        matching.sort_by(by_rating_then_activity);
        matching.truncate(limit);
        Ok(matching)
    }
}
