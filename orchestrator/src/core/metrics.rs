//! Matching throughput, latency and error metrics
//!
//! Counters are atomics updated from many concurrent task completions. Latency
//! samples go into a lock-guarded bounded buffer that the reporter drains on
//! every interval; counters are cumulative and never reset.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::service_info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::admission::AdmissionController;

/// Process-wide metrics aggregator owned by an orchestrator instance
#[derive(Debug)]
pub struct MatchingMetrics {
    tasks_processed: AtomicU64,
    tasks_dropped: AtomicU64,
    tasks_failed: AtomicU64,
    duplicates_suppressed: AtomicU64,
    proposals_created: AtomicU64,
    proposals_delivered: AtomicU64,
    notification_failures: AtomicU64,
    errors: AtomicU64,
    latency_capacity: usize,
    latencies: Mutex<VecDeque<Duration>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub tasks_processed: u64,
    pub tasks_dropped: u64,
    pub tasks_failed: u64,
    pub duplicates_suppressed: u64,
    pub proposals_created: u64,
    pub proposals_delivered: u64,
    pub notification_failures: u64,
    pub error_count: u64,
    pub pending_latency_samples: usize,
}

impl MetricsSnapshot {
    /// Events that reached a terminal outcome
    pub fn tasks_handled(&self) -> u64 {
        self.tasks_processed + self.tasks_dropped + self.tasks_failed + self.duplicates_suppressed
    }
}

/// Aggregate of the latency samples drained for one reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub samples: usize,
    pub average: Duration,
    pub max: Duration,
}

impl LatencySummary {
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let total: Duration = samples.iter().sum();
        let max = samples.iter().max().copied().unwrap_or_default();
        Some(Self {
            samples: samples.len(),
            average: total / samples.len() as u32,
            max,
        })
    }
}

impl Default for MatchingMetrics {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MatchingMetrics {
    pub fn new(latency_capacity: usize) -> Self {
        Self {
            tasks_processed: AtomicU64::new(0),
            tasks_dropped: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            proposals_created: AtomicU64::new(0),
            proposals_delivered: AtomicU64::new(0),
            notification_failures: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_capacity: latency_capacity.max(1),
            latencies: Mutex::new(VecDeque::with_capacity(latency_capacity.clamp(1, 1024))),
        }
    }

    pub fn record_task_processed(&self) {
        self.tasks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_dropped(&self) {
        self.tasks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_proposal_created(&self) {
        self.proposals_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_proposal_delivered(&self) {
        self.proposals_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification_failure(&self) {
        self.notification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Append a per-task latency sample, evicting the oldest when full
    pub fn record_latency(&self, latency: Duration) {
        let mut samples = self.latencies.lock().unwrap_or_else(|p| p.into_inner());
        if samples.len() >= self.latency_capacity {
            samples.pop_front();
        }
        samples.push_back(latency);
    }

    /// Take every pending latency sample and reset the buffer
    pub fn drain_latency(&self) -> Vec<Duration> {
        let mut samples = self.latencies.lock().unwrap_or_else(|p| p.into_inner());
        samples.drain(..).collect()
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let pending = self.latencies.lock().map(|s| s.len()).unwrap_or(0);
        MetricsSnapshot {
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            tasks_dropped: self.tasks_dropped.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            proposals_created: self.proposals_created.load(Ordering::Relaxed),
            proposals_delivered: self.proposals_delivered.load(Ordering::Relaxed),
            notification_failures: self.notification_failures.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
            pending_latency_samples: pending,
        }
    }
}

/// Periodic reporter running beside the matching pipeline
pub struct MetricsReporter {
    metrics: Arc<MatchingMetrics>,
    admission: AdmissionController,
    period: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<MatchingMetrics>, admission: AdmissionController, period: Duration) -> Self {
        Self {
            metrics,
            admission,
            period,
        }
    }

    /// Drain latency samples and log the aggregate counters
    pub fn report(&self) -> (MetricsSnapshot, Option<LatencySummary>) {
        let samples = self.metrics.drain_latency();
        let latency = LatencySummary::from_samples(&samples);
        let snapshot = self.metrics.snapshot();
        let (avg_ms, max_ms) = latency
            .map(|l| (l.average.as_secs_f64() * 1000.0, l.max.as_secs_f64() * 1000.0))
            .unwrap_or((0.0, 0.0));

        service_info!(
            tasks_processed = snapshot.tasks_processed,
            tasks_dropped = snapshot.tasks_dropped,
            tasks_failed = snapshot.tasks_failed,
            duplicates_suppressed = snapshot.duplicates_suppressed,
            proposals_created = snapshot.proposals_created,
            proposals_delivered = snapshot.proposals_delivered,
            notification_failures = snapshot.notification_failures,
            error_count = snapshot.error_count,
            active_tasks = self.admission.active_slots(),
            latency_samples = samples.len(),
            avg_latency_ms = avg_ms,
            max_latency_ms = max_ms,
            "📊 Matching metrics"
        );

        (snapshot, latency)
    }

    /// Run the reporter until `shutdown` flips to true
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.report();
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }
}
