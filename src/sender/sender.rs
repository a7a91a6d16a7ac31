use std::time::Duration;

use crate::message::AnyMessage;

use super::error::SendError;

/// Outward contract for sending messages, whatever the delivery backend.
pub trait Sender: Send + Sync {
    /// Send `message`. An empty `routing_key` publishes to the message
    /// type's own destination; otherwise the key names the endpoint.
    fn send_routed(&self, message: &dyn AnyMessage, routing_key: &str) -> Result<(), SendError>;

    fn send(&self, message: &dyn AnyMessage) -> Result<(), SendError> {
        self.send_routed(message, "")
    }

    /// Flush anything buffered, waiting at most `timeout`, and release
    /// resources. Senders without a buffer have nothing to do.
    fn shutdown(&self, _timeout: Duration) -> Result<(), SendError> {
        Ok(())
    }
}

/// Endpoint a message is published to.
pub(crate) fn resolve_endpoint<'a>(type_name: &'a str, routing_key: &'a str) -> &'a str {
    if routing_key.is_empty() {
        type_name
    } else {
        routing_key
    }
}
