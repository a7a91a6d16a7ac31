use thiserror::Error;

use crate::broker::BrokerError;
use crate::message::EnvelopeError;
use crate::store::StoreError;

/// Error type for work queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("queue is closed")]
    Closed,
}
