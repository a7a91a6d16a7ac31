//! Loopback broker for tests and single-process deployments.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::broker::{Broker, Delivery, DeliveryId};
use super::error::{BrokerError, BrokerErrorKind};
use crate::message::Envelope;

#[derive(Default)]
struct State {
    destinations: HashMap<String, VecDeque<Envelope>>,
    /// message type -> endpoints receiving it
    bindings: HashMap<String, BTreeSet<String>>,
    /// (type, endpoint) pairs already declared; cleared by `invalidate_caches`
    declared: HashSet<(String, String)>,
    in_flight: HashMap<DeliveryId, (String, Envelope)>,
    next_delivery: u64,
    published: Vec<(String, Envelope)>,
    acked: Vec<DeliveryId>,
    failing_publishes: usize,
    failing_receives: usize,
    publish_attempts: usize,
    creations: usize,
    invalidations: usize,
}

/// Thread-safe in-process broker.
///
/// Clones share the same state, so a test can keep one handle for
/// inspection while senders and receivers use others.
///
/// ```
/// use durable_bus::broker::{Broker, InMemoryBroker};
///
/// let broker = InMemoryBroker::new();
/// broker.create_destination("Orders.Placed", "billing").unwrap();
/// assert!(broker.has_destination("billing"));
/// assert_eq!(broker.destination_len("billing"), 0);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an endpoint and its bindings, as an administrator might.
    /// The declaration cache is left alone, so only `invalidate_caches`
    /// lets `create_destination` restore it.
    pub fn delete_destination(&self, endpoint: &str) -> bool {
        let mut state = self.state.lock();
        for endpoints in state.bindings.values_mut() {
            endpoints.remove(endpoint);
        }
        state.destinations.remove(endpoint).is_some()
    }

    pub fn has_destination(&self, endpoint: &str) -> bool {
        self.state.lock().destinations.contains_key(endpoint)
    }

    /// Messages waiting at `endpoint`, excluding in-flight deliveries.
    pub fn destination_len(&self, endpoint: &str) -> usize {
        self.state
            .lock()
            .destinations
            .get(endpoint)
            .map_or(0, VecDeque::len)
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Every accepted publish, in order, with the endpoint it was sent to.
    pub fn published(&self) -> Vec<(String, Envelope)> {
        self.state.lock().published.clone()
    }

    pub fn acknowledged(&self) -> Vec<DeliveryId> {
        self.state.lock().acked.clone()
    }

    /// Publish calls, including failed ones.
    pub fn publish_attempts(&self) -> usize {
        self.state.lock().publish_attempts
    }

    pub fn destination_creations(&self) -> usize {
        self.state.lock().creations
    }

    pub fn cache_invalidations(&self) -> usize {
        self.state.lock().invalidations
    }

    /// Fail the next `count` publishes with a transport error.
    pub fn fail_next_publishes(&self, count: usize) {
        self.state.lock().failing_publishes = count;
    }

    /// Fail the next `count` receives with a transport error.
    pub fn fail_next_receives(&self, count: usize) {
        self.state.lock().failing_receives = count;
    }
}

impl Broker for InMemoryBroker {
    fn publish(&self, endpoint: &str, envelope: &Envelope) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.publish_attempts += 1;
        if state.failing_publishes > 0 {
            state.failing_publishes -= 1;
            return Err(BrokerError::transport("injected publish failure"));
        }

        let targets: Vec<String> = if state.destinations.contains_key(endpoint) {
            vec![endpoint.to_string()]
        } else {
            let routes: Vec<&str> = if endpoint == envelope.type_name() {
                envelope.type_chain().iter().map(String::as_str).collect()
            } else {
                vec![endpoint]
            };
            routes
                .iter()
                .filter_map(|route| state.bindings.get(*route))
                .flatten()
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        if targets.is_empty() {
            debug!(endpoint, "published with no bound destinations");
        }
        for target in &targets {
            if let Some(queue) = state.destinations.get_mut(target) {
                queue.push_back(envelope.clone());
            }
        }
        state.published.push((endpoint.to_string(), envelope.clone()));
        Ok(())
    }

    fn try_receive(&self, endpoint: &str) -> Result<Option<Delivery>, BrokerError> {
        let mut state = self.state.lock();
        if state.failing_receives > 0 {
            state.failing_receives -= 1;
            return Err(BrokerError::transport("injected receive failure"));
        }

        let envelope = match state.destinations.get_mut(endpoint) {
            Some(queue) => queue.pop_front(),
            None => return Err(BrokerError::destination_missing(endpoint)),
        };
        let Some(envelope) = envelope else {
            return Ok(None);
        };

        state.next_delivery += 1;
        let id = DeliveryId(state.next_delivery);
        state
            .in_flight
            .insert(id, (endpoint.to_string(), envelope.clone()));
        Ok(Some(Delivery {
            id,
            endpoint: endpoint.to_string(),
            envelope,
        }))
    }

    fn ack(&self, delivery: DeliveryId) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.in_flight.remove(&delivery).is_none() {
            return Err(BrokerError::new(
                BrokerErrorKind::UnknownDelivery,
                format!("delivery {} is not in flight", delivery),
            ));
        }
        state.acked.push(delivery);
        Ok(())
    }

    fn nack(&self, delivery: DeliveryId, reason: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        let Some((endpoint, envelope)) = state.in_flight.remove(&delivery) else {
            return Err(BrokerError::new(
                BrokerErrorKind::UnknownDelivery,
                format!("delivery {} is not in flight", delivery),
            ));
        };
        debug!(%delivery, endpoint = %endpoint, reason, "requeueing delivery");
        // A deleted destination takes its unsettled deliveries with it.
        if let Some(queue) = state.destinations.get_mut(&endpoint) {
            queue.push_front(envelope);
        }
        Ok(())
    }

    fn create_destination(&self, message_type: &str, endpoint: &str) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        state.creations += 1;
        let key = (message_type.to_string(), endpoint.to_string());
        if state.declared.contains(&key) {
            return Ok(());
        }

        state
            .destinations
            .entry(endpoint.to_string())
            .or_default();
        state
            .bindings
            .entry(message_type.to_string())
            .or_default()
            .insert(endpoint.to_string());
        state.declared.insert(key);
        debug!(message_type, endpoint, "declared destination");
        Ok(())
    }

    fn invalidate_caches(&self) {
        let mut state = self.state.lock();
        state.invalidations += 1;
        state.declared.clear();
    }
}
