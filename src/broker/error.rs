use std::fmt;

use thiserror::Error;

/// Reason codes a broker failure is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorKind {
    /// The endpoint's destination does not exist on the broker (for AMQP,
    /// reply code 404). Receivers rebuild their bindings when they see it.
    DestinationMissing,
    /// Connection or channel failure; worth retrying.
    Transport,
    /// The broker refused the operation.
    Rejected,
    /// Ack or nack for a delivery the broker does not know.
    UnknownDelivery,
}

impl fmt::Display for BrokerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerErrorKind::DestinationMissing => "destination missing",
            BrokerErrorKind::Transport => "transport failure",
            BrokerErrorKind::Rejected => "rejected",
            BrokerErrorKind::UnknownDelivery => "unknown delivery",
        };
        f.write_str(name)
    }
}

/// Error type for broker operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct BrokerError {
    kind: BrokerErrorKind,
    message: String,
}

impl BrokerError {
    pub fn new(kind: BrokerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn destination_missing(endpoint: &str) -> Self {
        Self::new(
            BrokerErrorKind::DestinationMissing,
            format!("no destination named '{}'", endpoint),
        )
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::Transport, message)
    }

    pub fn kind(&self) -> BrokerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_destination_missing(&self) -> bool {
        self.kind == BrokerErrorKind::DestinationMissing
    }
}
