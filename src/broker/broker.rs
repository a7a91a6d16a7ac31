use std::fmt;

use super::error::BrokerError;
use crate::message::Envelope;

/// Broker-assigned handle for an unsettled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(pub u64);

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message taken from an endpoint and not yet acked or nacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: DeliveryId,
    pub endpoint: String,
    pub envelope: Envelope,
}

/// Publish/subscribe transport.
///
/// Publishing to a message type name fans out to every endpoint bound to
/// that type. Publishing to an endpoint name delivers to that endpoint only.
pub trait Broker: Send + Sync {
    fn publish(&self, endpoint: &str, envelope: &Envelope) -> Result<(), BrokerError>;

    /// Pull one message without blocking. A missing endpoint fails with
    /// [`BrokerErrorKind::DestinationMissing`](super::BrokerErrorKind::DestinationMissing).
    fn try_receive(&self, endpoint: &str) -> Result<Option<Delivery>, BrokerError>;

    fn ack(&self, delivery: DeliveryId) -> Result<(), BrokerError>;

    /// Return a delivery to the front of its endpoint.
    fn nack(&self, delivery: DeliveryId, reason: &str) -> Result<(), BrokerError>;

    /// Make sure `endpoint` exists and receives messages of `message_type`.
    fn create_destination(&self, message_type: &str, endpoint: &str) -> Result<(), BrokerError>;

    /// Forget which destinations are already known to exist, so the next
    /// `create_destination` declares them again.
    fn invalidate_caches(&self);
}
