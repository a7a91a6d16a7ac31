//! Broker contract, the loopback broker, and the polling work source.

#[allow(clippy::module_inception)]
mod broker;
mod error;
mod in_memory;
mod polling;

pub use broker::{Broker, Delivery, DeliveryId};
pub use error::{BrokerError, BrokerErrorKind};
pub use in_memory::InMemoryBroker;
pub use polling::PollingSource;
