//! Messages, envelopes and the type registry.
//!
//! ## Wire format
//!
//! ```text
//! V2=Colours.RedMessage;Colours.IColourMessage;IMessage||{"correlation_id":"...","text":"Red"}
//! ^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^ ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//! |  type chain, most-derived first                     payload (JSON for V2, base64 bitcode for V3)
//! version
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let registry = TypeRegistry::new();
//! registry.register::<RedMessage>();
//!
//! let text = registry.encode(&red, Codec::Json)?;
//! let decoded = registry.decode_text(&text)?;
//! assert_eq!(decoded.correlation(), red.correlation_id);
//! ```

mod envelope;
mod error;
#[allow(clippy::module_inception)]
mod message;
mod registry;

pub use envelope::{Codec, Envelope};
pub use error::EnvelopeError;
pub use message::{new_correlation_id, AnyMessage, Message};
pub use registry::TypeRegistry;
