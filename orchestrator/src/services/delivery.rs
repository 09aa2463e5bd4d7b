//! Delivery transport that hands proposals to the notification service over the bus

use std::sync::Arc;

use shared::{subjects, ProposalDelivery};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::traits::{DeliveryTransport, EventBus};

pub struct BusDeliveryTransport<B: EventBus> {
    bus: Arc<B>,
}

impl<B: EventBus> BusDeliveryTransport<B> {
    pub fn new(bus: Arc<B>) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl<B: EventBus + 'static> DeliveryTransport for BusDeliveryTransport<B> {
    async fn deliver(&self, delivery: ProposalDelivery) -> OrchestratorResult<()> {
        let payload = delivery.encode()?;
        self.bus
            .publish(subjects::PROPOSAL_DELIVERY, payload)
            .await
            .map_err(|e| OrchestratorError::delivery(delivery.proposal_id, e.to_string()))
    }
}
