//! Sending messages: straight to the broker, or through a local durable
//! buffer that forwards in the background.
//!
//! ```ignore
//! let sender = sender::from_config(&config, broker, context.hooks().clone())?;
//! sender.send(&OrderPlaced::new(order_id))?;
//! sender.send_routed(&AuditNote::new("manual refund"), "audit.inbox")?;
//! ```

mod buffered;
mod direct;
mod error;
mod retry;
#[allow(clippy::module_inception)]
mod sender;

use std::sync::Arc;

pub use buffered::{BufferSettings, BufferedSender, Outbound};
pub use direct::DirectSender;
pub use error::SendError;
pub use retry::DEFAULT_PUBLISH_ATTEMPTS;
pub use sender::Sender;

use crate::backoff::BackoffController;
use crate::broker::Broker;
use crate::config::{MessagingConfig, SenderMode};
use crate::hooks::HookRegistry;
use crate::queue::DurableQueue;

/// Build the sender `config.sender_mode` selects. Durable mode opens (and
/// locks) the local queue at `config.local_queue.path`.
pub fn from_config(
    config: &MessagingConfig,
    broker: Arc<dyn Broker>,
    hooks: HookRegistry,
) -> Result<Box<dyn Sender>, SendError> {
    match config.sender_mode {
        SenderMode::Direct => Ok(Box::new(
            DirectSender::new(broker, hooks)
                .with_codec(config.codec)
                .with_publish_attempts(config.publish_attempts),
        )),
        SenderMode::DurableBuffer => {
            let queue: DurableQueue<Outbound> =
                DurableQueue::open(&config.local_queue.path, config.local_queue.store_options())?
                    .with_idle_wait(config.dispatcher.idle_wait)
                    .with_backoff(Arc::new(BackoffController::new(config.backoff)));
            let settings = BufferSettings {
                codec: config.codec,
                publish_attempts: config.publish_attempts,
                drain_timeout: config.dispatcher.drain_timeout,
            };
            Ok(Box::new(BufferedSender::with_settings(queue, broker, hooks, settings)))
        }
    }
}
