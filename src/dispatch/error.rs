use std::error::Error;

use thiserror::Error;

use crate::broker::BrokerError;
use crate::message::EnvelopeError;

/// Failure reported by a message handler. The item is aborted and
/// redelivered.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Other(#[from] Box<dyn Error + Send + Sync>),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}
