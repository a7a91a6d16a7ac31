//! Pull-based work queue over one broker endpoint.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::broker::{Broker, Delivery, DeliveryId};
use crate::backoff::BackoffController;
use crate::queue::{Pending, QueueError, Resolution, WorkItem, WorkQueue};

/// Polls a broker endpoint, holding at most one prefetched delivery.
///
/// Receive errors never reach the dispatcher: they count as an empty poll.
/// When the endpoint has vanished from the broker, every message type ever
/// bound through [`add_message_type`](Self::add_message_type) is bound again
/// before the poll returns.
pub struct PollingSource {
    broker: Arc<dyn Broker>,
    endpoint: String,
    bound_types: Mutex<Vec<String>>,
    cached: Mutex<Option<Delivery>>,
    backoff: Arc<BackoffController>,
}

impl PollingSource {
    pub fn new(broker: Arc<dyn Broker>, endpoint: impl Into<String>, backoff: Arc<BackoffController>) -> Self {
        Self {
            broker,
            endpoint: endpoint.into(),
            bound_types: Mutex::new(Vec::new()),
            cached: Mutex::new(None),
            backoff,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn backoff(&self) -> &Arc<BackoffController> {
        &self.backoff
    }

    /// Remember that `message_type` is bound to this endpoint. Idempotent.
    pub fn add_message_type(&self, message_type: &str) {
        let mut types = self.bound_types.lock();
        if !types.iter().any(|known| known == message_type) {
            types.push(message_type.to_string());
        }
    }

    /// Bound types in registration order.
    pub fn bound_types(&self) -> Vec<String> {
        self.bound_types.lock().clone()
    }

    fn poll_broker(&self) -> Option<Delivery> {
        match self.broker.try_receive(&self.endpoint) {
            Ok(delivery) => delivery,
            Err(err) if err.is_destination_missing() => {
                warn!(endpoint = %self.endpoint, error = %err, "endpoint missing, rebuilding bindings");
                self.rebuild();
                None
            }
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "poll failed");
                None
            }
        }
    }

    fn rebuild(&self) {
        self.broker.invalidate_caches();
        let types = self.bound_types();
        for message_type in &types {
            if let Err(err) = self.broker.create_destination(message_type, &self.endpoint) {
                warn!(
                    endpoint = %self.endpoint,
                    message_type = %message_type,
                    error = %err,
                    "failed to recreate destination"
                );
            }
        }
        info!(endpoint = %self.endpoint, bound_types = types.len(), "rebuilt endpoint bindings");
    }
}

impl WorkQueue for PollingSource {
    type Item = Delivery;

    fn try_dequeue(&self) -> Result<WorkItem<Delivery>, QueueError> {
        let delivery = {
            let mut cached = self.cached.lock();
            cached.take().or_else(|| self.poll_broker())
        };
        Ok(match delivery {
            Some(delivery) => {
                let resolution = Settle {
                    broker: Arc::clone(&self.broker),
                    id: delivery.id,
                };
                WorkItem::Ready(Pending::new(delivery, resolution))
            }
            None => WorkItem::Empty,
        })
    }

    fn len(&self) -> usize {
        usize::from(self.cached.lock().is_some())
    }

    /// One poll cycle. A hit is cached for the next `try_dequeue` and resets
    /// the backoff; a miss grows it and sleeps before returning.
    fn ready(&self) -> bool {
        let found = {
            let mut cached = self.cached.lock();
            if cached.is_some() {
                return true;
            }
            *cached = self.poll_broker();
            cached.is_some()
        };

        if found {
            self.backoff.reset();
        } else {
            self.backoff.sleep_more();
        }
        found
    }

    fn on_handler_failed(&self) {
        self.backoff.sleep_more();
    }
}

impl Drop for PollingSource {
    fn drop(&mut self) {
        if let Some(delivery) = self.cached.get_mut().take() {
            if let Err(err) = self.broker.nack(delivery.id, "polling source dropped") {
                warn!(endpoint = %self.endpoint, error = %err, "failed to return prefetched delivery");
            }
        }
    }
}

/// Acks on commit, nacks on abort.
struct Settle {
    broker: Arc<dyn Broker>,
    id: DeliveryId,
}

impl Resolution for Settle {
    fn commit(self: Box<Self>) -> Result<(), QueueError> {
        self.broker.ack(self.id)?;
        Ok(())
    }

    fn abort(self: Box<Self>) {
        if let Err(err) = self.broker.nack(self.id, "handler did not complete") {
            warn!(delivery = %self.id, error = %err, "nack failed");
        }
    }
}
