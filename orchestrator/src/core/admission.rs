//! Admission control
//!
//! Bounds how many tasks are matched at once. Admission is non-blocking and
//! lossy: when every slot is taken the task is dropped, never queued. A slot
//! is an RAII guard, so it is released on every exit path including panics
//! and cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use shared::TaskId;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Bookkeeping for a task currently holding one or more slots
#[derive(Debug, Clone)]
pub struct ActiveTask {
    pub admitted_at: Instant,
    /// Concurrent attempts for the same task id (redelivered events)
    pub attempts: usize,
    pub proposal_limit: usize,
}

type ActiveTaskMap = Arc<RwLock<HashMap<TaskId, ActiveTask>>>;

/// Global task admission pool plus per-task proposal bound
#[derive(Debug, Clone)]
pub struct AdmissionController {
    capacity: usize,
    max_proposals_per_task: usize,
    slots: Arc<Semaphore>,
    active: ActiveTaskMap,
}

impl AdmissionController {
    pub fn new(max_concurrent_tasks: usize, max_proposals_per_task: usize) -> Self {
        Self {
            capacity: max_concurrent_tasks,
            max_proposals_per_task,
            slots: Arc::new(Semaphore::new(max_concurrent_tasks)),
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Try to admit a task without waiting
    ///
    /// # Returns
    /// A slot that must be held for the whole matching attempt, or
    /// `AdmissionDenied` when the pool is saturated
    pub fn try_acquire(&self, task_id: &TaskId) -> OrchestratorResult<TaskSlot> {
        let permit = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| OrchestratorError::AdmissionDenied {
                active: self.active_slots(),
                capacity: self.capacity,
            })?;

        {
            let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());
            active
                .entry(task_id.clone())
                .and_modify(|entry| entry.attempts += 1)
                .or_insert_with(|| ActiveTask {
                    admitted_at: Instant::now(),
                    attempts: 1,
                    proposal_limit: self.max_proposals_per_task,
                });
        }

        Ok(TaskSlot {
            task_id: task_id.clone(),
            proposal_limit: self.max_proposals_per_task,
            active: Arc::clone(&self.active),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_proposals_per_task(&self) -> usize {
        self.max_proposals_per_task
    }

    /// Slots currently held
    pub fn active_slots(&self) -> usize {
        self.capacity.saturating_sub(self.slots.available_permits())
    }

    pub fn is_active(&self, task_id: &TaskId) -> bool {
        self.active.read().map(|a| a.contains_key(task_id)).unwrap_or(false)
    }

    pub fn active_task(&self, task_id: &TaskId) -> Option<ActiveTask> {
        self.active.read().ok().and_then(|a| a.get(task_id).cloned())
    }

    /// Number of distinct task ids holding a slot
    pub fn active_task_count(&self) -> usize {
        self.active.read().map(|a| a.len()).unwrap_or(0)
    }
}

/// Admission slot held for one matching attempt
#[derive(Debug)]
pub struct TaskSlot {
    task_id: TaskId,
    proposal_limit: usize,
    active: ActiveTaskMap,
    _permit: OwnedSemaphorePermit,
}

impl TaskSlot {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Upper bound on proposals this attempt may issue
    pub fn proposal_limit(&self) -> usize {
        self.proposal_limit
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        let mut active = self.active.write().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = active.get_mut(&self.task_id) {
            entry.attempts = entry.attempts.saturating_sub(1);
            if entry.attempts == 0 {
                active.remove(&self.task_id);
            }
        }
    }
}

/// Suppresses task ids seen again within a time window
#[derive(Debug)]
pub struct DuplicateFilter {
    window: Duration,
    seen: Mutex<HashMap<TaskId, Instant>>,
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record a sighting of `task_id` at `now`
    ///
    /// # Returns
    /// `true` when the id was already seen inside the window
    pub fn check_and_record(&self, task_id: &TaskId, now: Instant) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        let window = self.window;
        seen.retain(|_, first_seen| now.saturating_duration_since(*first_seen) < window);

        if seen.contains_key(task_id) {
            return true;
        }
        seen.insert(task_id.clone(), now);
        false
    }

    /// Release `task_id` so its next delivery is processed again
    pub fn forget(&self, task_id: &TaskId) {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        seen.remove(task_id);
    }

    pub fn tracked(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }
}
