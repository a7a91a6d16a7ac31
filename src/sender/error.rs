use thiserror::Error;

use crate::broker::BrokerError;
use crate::message::EnvelopeError;
use crate::queue::QueueError;

/// Error type for [`Sender::send`](super::Sender::send).
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to encode message: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Every publish attempt failed; this is the last broker error.
    #[error("publish failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: BrokerError,
    },

    #[error("failed to buffer message: {0}")]
    Queue(#[from] QueueError),
}
