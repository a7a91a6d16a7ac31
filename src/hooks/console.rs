use tracing::info;

use super::hook::{EventHook, HookError};
use crate::message::AnyMessage;

/// Logs every sent and received message at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEventHook;

impl EventHook for ConsoleEventHook {
    fn message_sent(&self, message: &dyn AnyMessage) -> Result<(), HookError> {
        info!(
            message_type = message.type_name(),
            correlation_id = %message.correlation(),
            "message sent"
        );
        Ok(())
    }

    fn message_received(&self, message: &dyn AnyMessage, endpoint: &str) -> Result<(), HookError> {
        info!(
            message_type = message.type_name(),
            correlation_id = %message.correlation(),
            endpoint,
            "message received"
        );
        Ok(())
    }
}
