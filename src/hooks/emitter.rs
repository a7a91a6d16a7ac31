use event_emitter_rs::EventEmitter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hook::{EventHook, HookError};
use crate::message::AnyMessage;

/// Event name emitted for sent messages.
pub const SENT_EVENT: &str = "message.sent";
/// Event name emitted for received messages.
pub const RECEIVED_EVENT: &str = "message.received";

/// Payload handed to emitter listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookNotice {
    pub message_type: String,
    pub correlation_id: Uuid,
    pub endpoint: Option<String>,
}

/// Forwards notifications to an in-process [`EventEmitter`].
///
/// Listeners subscribe with `emitter.on(SENT_EVENT, |notice: HookNotice| ..)`.
/// The emitter runs each listener on its own thread.
pub struct EmitterHook {
    emitter: Mutex<EventEmitter>,
}

impl EmitterHook {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            emitter: Mutex::new(emitter),
        }
    }

    fn emit(&self, event: &str, notice: HookNotice) {
        self.emitter.lock().emit(event, notice);
    }
}

impl EventHook for EmitterHook {
    fn message_sent(&self, message: &dyn AnyMessage) -> Result<(), HookError> {
        self.emit(
            SENT_EVENT,
            HookNotice {
                message_type: message.type_name().to_string(),
                correlation_id: message.correlation(),
                endpoint: None,
            },
        );
        Ok(())
    }

    fn message_received(&self, message: &dyn AnyMessage, endpoint: &str) -> Result<(), HookError> {
        self.emit(
            RECEIVED_EVENT,
            HookNotice {
                message_type: message.type_name().to_string(),
                correlation_id: message.correlation(),
                endpoint: Some(endpoint.to_string()),
            },
        );
        Ok(())
    }
}
