//! Shared fixtures for the polling tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use durable_bus::backoff::{BackoffConfig, BackoffController, Sleeper};
use durable_bus::broker::{Broker, InMemoryBroker, PollingSource};
use durable_bus::Envelope;
use parking_lot::Mutex;

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn source(broker: &InMemoryBroker, endpoint: &str, sleeper: Arc<RecordingSleeper>) -> PollingSource {
    let backoff = BackoffController::with_sleeper(
        BackoffConfig::new(Duration::from_millis(10), Duration::from_millis(100)),
        sleeper,
    );
    PollingSource::new(Arc::new(broker.clone()), endpoint, Arc::new(backoff))
}

/// Bind `types` to `endpoint` both on the broker and on the source.
pub fn bind(broker: &InMemoryBroker, source: &PollingSource, types: &[&str]) {
    for message_type in types {
        broker.create_destination(message_type, source.endpoint()).unwrap();
        source.add_message_type(message_type);
    }
}

pub fn envelope(message_type: &str, payload: &str) -> Envelope {
    Envelope::parse(&format!("V2={}||{}", message_type, payload)).unwrap()
}
