//! Store-and-forward sender.
//!
//! `send` only appends to a local durable queue. A single-worker dispatcher
//! publishes queued messages in order; a message whose publish attempts are
//! all exhausted is put back and retried after a backoff, never dropped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::SendError;
use super::retry::{publish_with_retry, DEFAULT_PUBLISH_ATTEMPTS};
use super::sender::{resolve_endpoint, Sender};
use crate::broker::Broker;
use crate::dispatch::{DispatchStats, Dispatcher, DispatcherHandle, HandlerError};
use crate::hooks::HookRegistry;
use crate::message::{AnyMessage, Codec, Envelope, EnvelopeError};
use crate::queue::{DurableQueue, Record, WorkQueue};
use crate::store::{DurableStore, FileStore};

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
/// Drain allowed when dropped without `shutdown`. Whatever is left stays on
/// disk for the next start.
const DROP_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// A buffered message with the endpoint it is bound for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub endpoint: String,
    pub envelope: Envelope,
}

#[derive(Serialize, Deserialize)]
struct OutboundRecord {
    endpoint: String,
    envelope: String,
}

impl Record for Outbound {
    fn to_record(&self) -> Result<Vec<u8>, EnvelopeError> {
        let record = OutboundRecord {
            endpoint: self.endpoint.clone(),
            envelope: self.envelope.to_string(),
        };
        Ok(serde_json::to_vec(&record)?)
    }

    fn from_record(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let record: OutboundRecord = serde_json::from_slice(bytes)?;
        Ok(Outbound {
            endpoint: record.endpoint,
            envelope: Envelope::parse(&record.envelope)?,
        })
    }
}

/// Tuning for a [`BufferedSender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSettings {
    pub codec: Codec,
    pub publish_attempts: usize,
    /// How long shutdown waits for the buffer to empty.
    pub drain_timeout: Duration,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

type OutboundQueue<S> = DurableQueue<Outbound, S>;

/// Sender that persists locally and forwards to the broker in the background.
pub struct BufferedSender<S: DurableStore + 'static = FileStore> {
    queue: Arc<OutboundQueue<S>>,
    dispatcher: Mutex<Option<DispatcherHandle<OutboundQueue<S>>>>,
    hooks: HookRegistry,
    settings: BufferSettings,
}

impl<S: DurableStore + 'static> BufferedSender<S> {
    pub fn new(queue: OutboundQueue<S>, broker: Arc<dyn Broker>, hooks: HookRegistry) -> Self {
        Self::with_settings(queue, broker, hooks, BufferSettings::default())
    }

    /// Start forwarding from `queue`. Attach a backoff to the queue to pace
    /// retries while the broker is down.
    pub fn with_settings(
        queue: OutboundQueue<S>,
        broker: Arc<dyn Broker>,
        hooks: HookRegistry,
        settings: BufferSettings,
    ) -> Self {
        let queue = Arc::new(queue);
        let attempts = settings.publish_attempts.max(1);

        // One worker keeps publishes in enqueue order.
        let dispatcher = Dispatcher::new(Arc::clone(&queue), move |outbound: &Outbound| {
            publish_with_retry(broker.as_ref(), &outbound.endpoint, &outbound.envelope, attempts)
                .map_err(HandlerError::from)
        })
        .with_max_in_flight(1)
        .with_name("outbound")
        .start();

        Self {
            queue,
            dispatcher: Mutex::new(Some(dispatcher)),
            hooks,
            settings,
        }
    }

    /// Messages waiting to be forwarded, including one being published.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Wait up to `timeout` for the buffer to drain, stop forwarding and
    /// close the store. Anything left stays on disk for the next start.
    pub fn shutdown_with_stats(&self, timeout: Duration) -> Result<Option<DispatchStats>, SendError> {
        let stats = self
            .dispatcher
            .lock()
            .take()
            .map(|dispatcher| dispatcher.drain_and_stop(timeout));
        self.queue.close()?;
        if let Some(stats) = &stats {
            info!(
                published = stats.handled,
                left_behind = stats.left_behind,
                "buffered sender shut down"
            );
        }
        Ok(stats)
    }
}

impl<S: DurableStore + 'static> Sender for BufferedSender<S> {
    fn send_routed(&self, message: &dyn AnyMessage, routing_key: &str) -> Result<(), SendError> {
        let envelope = Envelope::seal(message, self.settings.codec)?;
        let outbound = Outbound {
            endpoint: resolve_endpoint(message.type_name(), routing_key).to_string(),
            envelope,
        };
        self.queue.enqueue_record(&outbound)?;
        self.hooks.notify_sent(message);
        Ok(())
    }

    fn shutdown(&self, timeout: Duration) -> Result<(), SendError> {
        self.shutdown_with_stats(timeout).map(|_| ())
    }
}

impl<S: DurableStore + 'static> Drop for BufferedSender<S> {
    fn drop(&mut self) {
        let timeout = self.settings.drain_timeout.min(DROP_DRAIN_TIMEOUT);
        if let Err(err) = self.shutdown_with_stats(timeout) {
            warn!(error = %err, "buffered sender did not shut down cleanly");
        }
    }
}
