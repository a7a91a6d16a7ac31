//! Explicit message type table.
//!
//! Every message kind a process can decode is registered up front. The set of
//! contracts a kind satisfies (itself plus its supertypes, and the supertypes
//! of any registered supertype) is computed once at registration, so matching
//! a delivery against a handler's contract is a table lookup.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::envelope::{Codec, Envelope};
use super::error::EnvelopeError;
use super::message::{AnyMessage, Message};

type DecodeFn = fn(Codec, &str) -> Result<Box<dyn AnyMessage>, EnvelopeError>;

fn decode_boxed<M: Message>(codec: Codec, payload: &str) -> Result<Box<dyn AnyMessage>, EnvelopeError> {
    let message: M = codec.decode(payload)?;
    Ok(Box::new(message))
}

struct Kind {
    decode: DecodeFn,
    contracts: Vec<&'static str>,
}

/// Registered message kinds, keyed by type name.
#[derive(Default)]
pub struct TypeRegistry {
    kinds: RwLock<HashMap<&'static str, Kind>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` as a decodable kind. Registering twice is a no-op.
    pub fn register<M: Message>(&self) {
        let mut kinds = self.kinds.write();
        if kinds.contains_key(M::TYPE_NAME) {
            return;
        }

        let mut contracts = vec![M::TYPE_NAME];
        for &supertype in M::SUPERTYPES {
            if !contracts.contains(&supertype) {
                contracts.push(supertype);
            }
            if let Some(parent) = kinds.get(supertype) {
                for &inherited in &parent.contracts {
                    if !contracts.contains(&inherited) {
                        contracts.push(inherited);
                    }
                }
            }
        }

        kinds.insert(
            M::TYPE_NAME,
            Kind {
                decode: decode_boxed::<M>,
                contracts,
            },
        );
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.kinds.read().contains_key(type_name)
    }

    /// Contracts satisfied by a registered kind, most-derived first.
    pub fn contracts_of(&self, type_name: &str) -> Vec<&'static str> {
        self.kinds
            .read()
            .get(type_name)
            .map(|kind| kind.contracts.clone())
            .unwrap_or_default()
    }

    /// Whether a registered kind satisfies `contract`.
    pub fn is_a(&self, type_name: &str, contract: &str) -> bool {
        self.kinds
            .read()
            .get(type_name)
            .is_some_and(|kind| kind.contracts.iter().any(|&c| c == contract))
    }

    /// Encode a message to its wire text.
    pub fn encode(&self, message: &dyn AnyMessage, codec: Codec) -> Result<String, EnvelopeError> {
        Ok(Envelope::seal(message, codec)?.to_string())
    }

    /// Decode an envelope, using the first type in its chain that is registered.
    /// Codecs that cannot decode as a supertype only try the first name.
    pub fn decode(&self, envelope: &Envelope) -> Result<Box<dyn AnyMessage>, EnvelopeError> {
        let codec = envelope.codec()?;
        let candidates = if codec.decodes_as_supertype() {
            envelope.type_chain()
        } else {
            &envelope.type_chain()[..1]
        };
        let decode = {
            let kinds = self.kinds.read();
            candidates
                .iter()
                .find_map(|name| kinds.get(name.as_str()).map(|kind| kind.decode))
        };

        match decode {
            Some(decode) => decode(codec, envelope.payload()),
            None => Err(EnvelopeError::UnknownType(envelope.type_chain().to_vec())),
        }
    }

    pub fn decode_text(&self, text: &str) -> Result<Box<dyn AnyMessage>, EnvelopeError> {
        self.decode(&Envelope::parse(text)?)
    }
}
