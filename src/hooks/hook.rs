use std::error::Error;

use thiserror::Error;

use crate::message::AnyMessage;

/// Error returned by an [`EventHook`].
#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook failed: {0}")]
    Failed(String),

    #[error("hook error: {0}")]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

/// Observer of send and receive events.
///
/// Hooks run on the thread that sent or received the message. A hook that
/// returns an error or panics is logged and skipped; it never affects the
/// operation being observed or the other hooks.
pub trait EventHook: Send + Sync {
    /// A message was accepted by a sender.
    fn message_sent(&self, message: &dyn AnyMessage) -> Result<(), HookError>;

    /// A message was delivered to a handler listening on `endpoint`.
    fn message_received(&self, message: &dyn AnyMessage, endpoint: &str) -> Result<(), HookError>;
}
