//! Versioned, type-tagged text envelope.
//!
//! Wire form: `V<version>=<type-chain>||<payload>`
//!
//! - `<version>` selects the payload codec (2 = JSON, 3 = base64 bitcode)
//! - `<type-chain>` is the message type name followed by its supertypes,
//!   most-derived first, separated by `;`
//! - `<payload>` is everything after the first `||`
//!
//! Parsing and formatting are exact inverses: `Envelope::parse(s)?.to_string() == s`.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::EnvelopeError;
use super::message::AnyMessage;

const TYPE_SEPARATOR: char = ';';
const PAYLOAD_SEPARATOR: &str = "||";

/// Payload body encoding, identified on the wire by the envelope version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    #[default]
    Json,
    Bitcode,
}

impl Codec {
    pub const fn version(self) -> u32 {
        match self {
            Codec::Json => 2,
            Codec::Bitcode => 3,
        }
    }

    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            2 => Some(Codec::Json),
            3 => Some(Codec::Bitcode),
            _ => None,
        }
    }

    /// Whether a payload can be read back as one of the sender's supertypes.
    /// JSON ignores unknown fields; bitcode has no field names to skip by.
    pub const fn decodes_as_supertype(self) -> bool {
        matches!(self, Codec::Json)
    }

    pub(crate) fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<String, EnvelopeError> {
        match self {
            Codec::Json => Ok(serde_json::to_string(value)?),
            Codec::Bitcode => {
                let bytes = bitcode::serialize(value)?;
                Ok(STANDARD.encode(bytes))
            }
        }
    }

    pub(crate) fn decode<T: DeserializeOwned>(self, payload: &str) -> Result<T, EnvelopeError> {
        match self {
            Codec::Json => Ok(serde_json::from_str(payload)?),
            Codec::Bitcode => {
                let bytes = STANDARD.decode(payload)?;
                Ok(bitcode::deserialize(&bytes)?)
            }
        }
    }
}

/// A serialized message ready for storage or transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    version: u32,
    type_chain: Vec<String>,
    payload: String,
}

impl Envelope {
    /// Serialize a message into an envelope.
    pub fn seal(message: &dyn AnyMessage, codec: Codec) -> Result<Self, EnvelopeError> {
        if !codec.decodes_as_supertype() && !message.supertypes().is_empty() {
            return Err(EnvelopeError::SupertypesNeedJson(message.type_name().to_string()));
        }
        let payload = message.encode_payload(codec)?;
        Ok(Self {
            version: codec.version(),
            type_chain: message.type_chain().into_iter().map(String::from).collect(),
            payload,
        })
    }

    /// Parse the wire form.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let malformed = |reason: &str| EnvelopeError::Malformed(reason.to_string());

        let rest = text
            .strip_prefix('V')
            .ok_or_else(|| malformed("missing 'V' prefix"))?;
        let (version, rest) = rest
            .split_once('=')
            .ok_or_else(|| malformed("missing '=' after version"))?;
        if version.is_empty()
            || !version.bytes().all(|b| b.is_ascii_digit())
            || (version.len() > 1 && version.starts_with('0'))
        {
            return Err(malformed("version is not a canonical integer"));
        }
        let version: u32 = version
            .parse()
            .map_err(|_| malformed("version out of range"))?;

        let (chain, payload) = rest
            .split_once(PAYLOAD_SEPARATOR)
            .ok_or_else(|| malformed("missing '||' before payload"))?;
        let type_chain: Vec<String> = chain.split(TYPE_SEPARATOR).map(String::from).collect();
        if type_chain.iter().any(|name| name.is_empty()) {
            return Err(malformed("empty type name"));
        }

        Ok(Self {
            version,
            type_chain,
            payload: payload.to_string(),
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Codec for this envelope's version, if the version is supported.
    pub fn codec(&self) -> Result<Codec, EnvelopeError> {
        Codec::from_version(self.version).ok_or(EnvelopeError::UnsupportedVersion(self.version))
    }

    /// Type names, most-derived first.
    pub fn type_chain(&self) -> &[String] {
        &self.type_chain
    }

    /// The most-derived type name.
    pub fn type_name(&self) -> &str {
        &self.type_chain[0]
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decode the payload directly as `T`, ignoring the type chain.
    pub fn decode_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        self.codec()?.decode(&self.payload)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.to_string().into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EnvelopeError::Malformed(format!("not utf-8: {}", e)))?;
        Self::parse(text)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}=", self.version)?;
        for (i, name) in self.type_chain.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", TYPE_SEPARATOR)?;
            }
            f.write_str(name)?;
        }
        write!(f, "{}{}", PAYLOAD_SEPARATOR, self.payload)
    }
}

impl FromStr for Envelope {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
