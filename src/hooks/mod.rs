//! Event hooks - fault-isolated observers of send and receive events.
//!
//! ```ignore
//! let hooks = HookRegistry::new();
//! hooks.register(Arc::new(ConsoleEventHook));
//!
//! // Sender and receiver call these; a failing hook is logged and skipped.
//! hooks.notify_sent(&message);
//! hooks.notify_received(&message, "orders.service");
//! ```

mod console;
#[cfg(feature = "emitter")]
mod emitter;
mod hook;
mod registry;

pub use console::ConsoleEventHook;
#[cfg(feature = "emitter")]
pub use emitter::{EmitterHook, HookNotice, RECEIVED_EVENT, SENT_EVENT};
pub use hook::{EventHook, HookError};
pub use registry::HookRegistry;
