//! Messages, hooks and brokers shared by the sender tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use durable_bus::broker::{Broker, BrokerError, Delivery, DeliveryId, InMemoryBroker};
use durable_bus::hooks::{EventHook, HookError};
use durable_bus::{AnyMessage, Envelope, Message};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub correlation_id: Uuid,
    pub number: u32,
}

impl Message for Invoice {
    const TYPE_NAME: &'static str = "Billing.Invoice";

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

pub fn invoice(number: u32) -> Invoice {
    Invoice {
        correlation_id: Uuid::new_v4(),
        number,
    }
}

pub fn number_of(envelope: &Envelope) -> u32 {
    envelope.decode_as::<Invoice>().unwrap().number
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A broker whose publishes take a while, recording when each starts and
/// finishes so tests can tell whether two ever overlapped.
#[derive(Clone, Default)]
pub struct SlowBroker {
    pub inner: InMemoryBroker,
    pub events: Arc<Mutex<Vec<PublishEvent>>>,
    active: Arc<AtomicUsize>,
    pub overlaps: Arc<AtomicUsize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishEvent {
    Started(u32),
    Finished(u32),
}

impl Broker for SlowBroker {
    fn publish(&self, endpoint: &str, envelope: &Envelope) -> Result<(), BrokerError> {
        let number = number_of(envelope);
        if self.active.fetch_add(1, Ordering::SeqCst) != 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.events.lock().push(PublishEvent::Started(number));
        thread::sleep(Duration::from_millis(3));
        let outcome = self.inner.publish(endpoint, envelope);
        self.events.lock().push(PublishEvent::Finished(number));
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn try_receive(&self, endpoint: &str) -> Result<Option<Delivery>, BrokerError> {
        self.inner.try_receive(endpoint)
    }

    fn ack(&self, delivery: DeliveryId) -> Result<(), BrokerError> {
        self.inner.ack(delivery)
    }

    fn nack(&self, delivery: DeliveryId, reason: &str) -> Result<(), BrokerError> {
        self.inner.nack(delivery, reason)
    }

    fn create_destination(&self, message_type: &str, endpoint: &str) -> Result<(), BrokerError> {
        self.inner.create_destination(message_type, endpoint)
    }

    fn invalidate_caches(&self) {
        self.inner.invalidate_caches()
    }
}

/// Records the correlation id of every message it sees.
#[derive(Default)]
pub struct RecordingHook {
    pub sent: Mutex<Vec<Uuid>>,
    pub received: Mutex<Vec<(Uuid, String)>>,
}

impl EventHook for RecordingHook {
    fn message_sent(&self, message: &dyn AnyMessage) -> Result<(), HookError> {
        self.sent.lock().push(message.correlation());
        Ok(())
    }

    fn message_received(&self, message: &dyn AnyMessage, endpoint: &str) -> Result<(), HookError> {
        self.received
            .lock()
            .push((message.correlation(), endpoint.to_string()));
        Ok(())
    }
}

pub struct FailingHook;

impl EventHook for FailingHook {
    fn message_sent(&self, _message: &dyn AnyMessage) -> Result<(), HookError> {
        Err(HookError::Failed("audit log unavailable".to_string()))
    }

    fn message_received(&self, _message: &dyn AnyMessage, _endpoint: &str) -> Result<(), HookError> {
        Err(HookError::Failed("audit log unavailable".to_string()))
    }
}

pub struct PanickingHook;

impl EventHook for PanickingHook {
    fn message_sent(&self, _message: &dyn AnyMessage) -> Result<(), HookError> {
        panic!("hook panicked on send");
    }

    fn message_received(&self, _message: &dyn AnyMessage, _endpoint: &str) -> Result<(), HookError> {
        panic!("hook panicked on receive");
    }
}
