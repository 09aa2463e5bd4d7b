//! In-process publish/subscribe bus
//!
//! Subject-keyed fan-out over tokio mpsc channels. Every live subscriber of a
//! subject receives every payload published after it subscribed; closed
//! subscribers are pruned on the next publish. Publishing to a subject with no
//! subscribers succeeds and the payload is discarded.

use std::collections::HashMap;
use std::sync::Arc;

use shared::service_debug;
use tokio::sync::{mpsc, Mutex};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::EventBus;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type Subscribers = HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>;

#[derive(Clone)]
pub struct InMemoryEventBus {
    subscribers: Arc<Mutex<Subscribers>>,
    channel_capacity: usize,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus whose per-subscriber buffers hold `channel_capacity` payloads
    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub async fn subscriber_count(&self, subject: &str) -> usize {
        let subscribers = self.subscribers.lock().await;
        subscribers
            .get(subject)
            .map(|subs| subs.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> OrchestratorResult<()> {
        let targets: Vec<mpsc::Sender<Vec<u8>>> = {
            let mut subscribers = self.subscribers.lock().await;
            match subscribers.get_mut(subject) {
                Some(subs) => {
                    subs.retain(|s| !s.is_closed());
                    subs.clone()
                }
                None => Vec::new(),
            }
        };

        if targets.is_empty() {
            service_debug!(subject, "No subscribers, payload discarded");
            return Ok(());
        }

        let mut delivered = 0usize;
        for target in &targets {
            if target.send(payload.clone()).await.is_ok() {
                delivered += 1;
            }
        }

        if delivered == 0 {
            return Err(OrchestratorError::publish(subject, "every subscriber went away"));
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> OrchestratorResult<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let mut subscribers = self.subscribers.lock().await;
        subscribers.entry(subject.to_string()).or_default().push(tx);
        Ok(rx)
    }
}
