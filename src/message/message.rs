//! Typed messages and their object-safe view.

use std::any::Any;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::envelope::Codec;
use super::error::EnvelopeError;

/// A message that can travel through the bus.
///
/// `TYPE_NAME` is the stable identifier written into envelopes and used as
/// the default exchange when sending. `SUPERTYPES` lists the contracts this
/// message also satisfies, ordered from most-derived to base. Receivers that
/// registered any of those contracts can decode the message.
///
/// ```
/// use durable_bus::Message;
/// use serde::{Deserialize, Serialize};
/// use uuid::Uuid;
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// struct RedMessage {
///     correlation_id: Uuid,
///     text: String,
/// }
///
/// impl Message for RedMessage {
///     const TYPE_NAME: &'static str = "Colours.RedMessage";
///     const SUPERTYPES: &'static [&'static str] = &["Colours.IColourMessage"];
///
///     fn correlation_id(&self) -> Uuid {
///         self.correlation_id
///     }
/// }
/// ```
pub trait Message: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    const TYPE_NAME: &'static str;
    const SUPERTYPES: &'static [&'static str] = &[];

    /// Identifier of this message instance; fixed at creation.
    fn correlation_id(&self) -> Uuid;
}

/// Object-safe view of a [`Message`], used where the concrete type is only
/// known at runtime (hooks, decoded deliveries, the durable buffer).
pub trait AnyMessage: fmt::Debug + Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    fn supertypes(&self) -> &'static [&'static str];

    fn correlation(&self) -> Uuid;

    /// Serialize only the body, in the given codec.
    fn encode_payload(&self, codec: Codec) -> Result<String, EnvelopeError>;

    fn as_any(&self) -> &dyn Any;
}

impl<M: Message> AnyMessage for M {
    fn type_name(&self) -> &'static str {
        M::TYPE_NAME
    }

    fn supertypes(&self) -> &'static [&'static str] {
        M::SUPERTYPES
    }

    fn correlation(&self) -> Uuid {
        self.correlation_id()
    }

    fn encode_payload(&self, codec: Codec) -> Result<String, EnvelopeError> {
        codec.encode(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn AnyMessage {
    /// Borrow the concrete message if it is an `M`.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// The message's own type name followed by its supertypes.
    pub fn type_chain(&self) -> Vec<&'static str> {
        let mut chain = Vec::with_capacity(1 + self.supertypes().len());
        chain.push(self.type_name());
        chain.extend_from_slice(self.supertypes());
        chain
    }
}

/// Fresh correlation identifier for a new message instance.
pub fn new_correlation_id() -> Uuid {
    Uuid::new_v4()
}
