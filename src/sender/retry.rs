use tracing::{debug, warn};

use crate::broker::{Broker, BrokerError};
use crate::message::Envelope;

/// Attempts per publish before giving up.
pub const DEFAULT_PUBLISH_ATTEMPTS: usize = 5;

/// Publish with up to `attempts` tries, stopping at the first success.
/// Returns the last error when every try fails.
pub(crate) fn publish_with_retry(
    broker: &dyn Broker,
    endpoint: &str,
    envelope: &Envelope,
    attempts: usize,
) -> Result<(), BrokerError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match broker.publish(endpoint, envelope) {
            Ok(()) => {
                debug!(endpoint, attempt, message_type = envelope.type_name(), "published");
                return Ok(());
            }
            Err(err) if attempt < attempts => {
                warn!(endpoint, attempt, error = %err, "publish failed, retrying");
                attempt += 1;
            }
            Err(err) => {
                warn!(endpoint, attempt, error = %err, "publish failed, giving up");
                return Err(err);
            }
        }
    }
}
