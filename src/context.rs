//! Process-scoped messaging state.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::{ConfigError, MessagingConfig};
use crate::hooks::HookRegistry;
use crate::message::TypeRegistry;
use crate::receiver::ReceiverNode;
use crate::sender::{self, SendError, Sender};

/// Hooks and message types shared by every sender and receiver built from
/// it. Cloning shares the same registries.
#[derive(Clone, Default)]
pub struct MessagingContext {
    hooks: HookRegistry,
    types: Arc<TypeRegistry>,
}

impl MessagingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Remove every registered hook. Registered message types stay, since
    /// running receivers depend on them.
    pub fn reset(&self) {
        self.hooks.clear();
    }

    /// Validate `config` and build the sender it selects.
    pub fn sender(&self, config: &MessagingConfig, broker: Arc<dyn Broker>) -> Result<Box<dyn Sender>, ContextError> {
        config.validate()?;
        Ok(sender::from_config(config, broker, self.hooks.clone())?)
    }

    /// A receiver for `endpoint` using the backoff and worker settings in `config`.
    pub fn receiver(&self, config: &MessagingConfig, broker: Arc<dyn Broker>, endpoint: &str) -> ReceiverNode {
        ReceiverNode::new(self, broker, endpoint)
            .with_backoff(config.backoff)
            .with_max_in_flight(config.dispatcher.max_in_flight)
    }
}

/// Error building a component from a [`MessagingContext`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Send(#[from] SendError),
}
