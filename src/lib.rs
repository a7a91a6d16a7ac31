//! At-least-once messaging over a publish/subscribe broker.
//!
//! Senders either publish straight to the broker or persist to a local
//! durable queue that forwards in the background. Receivers poll an endpoint,
//! rebuild its bindings if the broker loses them, and run handlers on a
//! worker pool that acknowledges on success and requeues on failure. Event
//! hooks observe every send and receive without being able to break them.

pub mod backoff;
pub mod broker;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod hooks;
pub mod message;
pub mod queue;
pub mod receiver;
pub mod sender;
pub mod store;

pub use backoff::{BackoffConfig, BackoffController};
pub use broker::{Broker, BrokerError, BrokerErrorKind, InMemoryBroker, PollingSource};
pub use config::{ConfigError, MessagingConfig, SenderMode};
pub use context::{ContextError, MessagingContext};
pub use dispatch::{DispatchStats, Dispatcher, HandlerError};
pub use hooks::{ConsoleEventHook, EventHook, HookError, HookRegistry};
pub use message::{AnyMessage, Codec, Envelope, EnvelopeError, Message, TypeRegistry};
pub use queue::{DurableQueue, QueueError, WorkItem, WorkQueue};
pub use receiver::ReceiverNode;
pub use sender::{BufferedSender, DirectSender, SendError, Sender};
pub use store::{FileStore, StoreError, StoreOptions};

// Re-export the EventEmitter used by `hooks::EmitterHook`
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
