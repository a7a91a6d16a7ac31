use std::sync::Arc;

use super::error::SendError;
use super::retry::{publish_with_retry, DEFAULT_PUBLISH_ATTEMPTS};
use super::sender::{resolve_endpoint, Sender};
use crate::broker::Broker;
use crate::hooks::HookRegistry;
use crate::message::{AnyMessage, Codec, Envelope};

/// Publishes straight to the broker, retrying a bounded number of times.
/// Nothing is buffered: when every attempt fails the caller gets the error.
pub struct DirectSender {
    broker: Arc<dyn Broker>,
    hooks: HookRegistry,
    codec: Codec,
    attempts: usize,
}

impl DirectSender {
    pub fn new(broker: Arc<dyn Broker>, hooks: HookRegistry) -> Self {
        Self {
            broker,
            hooks,
            codec: Codec::default(),
            attempts: DEFAULT_PUBLISH_ATTEMPTS,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_publish_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

impl Sender for DirectSender {
    fn send_routed(&self, message: &dyn AnyMessage, routing_key: &str) -> Result<(), SendError> {
        let envelope = Envelope::seal(message, self.codec)?;
        let endpoint = resolve_endpoint(message.type_name(), routing_key);

        publish_with_retry(self.broker.as_ref(), endpoint, &envelope, self.attempts).map_err(|source| {
            SendError::Exhausted {
                attempts: self.attempts,
                source,
            }
        })?;

        self.hooks.notify_sent(message);
        Ok(())
    }
}
