use thiserror::Error;

/// Error type for envelope encoding and decoding.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The text does not follow `V<version>=<types>||<payload>`.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// No codec is known for this envelope version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u32),

    /// Bitcode payloads only decode as their exact type, so a message with
    /// supertypes cannot be sealed with it.
    #[error("{0} declares supertypes; bitcode payloads cannot be decoded as a supertype, use the json codec")]
    SupertypesNeedJson(String),

    /// None of the types in the chain is registered.
    #[error("no registered message type in chain [{}]", .0.join(", "))]
    UnknownType(Vec<String>),

    #[error("json payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bitcode payload error: {0}")]
    Bitcode(#[from] bitcode::Error),

    #[error("base64 payload error: {0}")]
    Base64(#[from] base64::DecodeError),
}
