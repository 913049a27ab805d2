//! Canonical wire encoding and content digests for command envelopes.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::envelope::CommandEnvelope;

pub const WIRE_ENCODING_CBOR: &str = "cbor";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    Serde(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Serde(message) => write!(f, "wire serde error: {message}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<serde_cbor::Error> for WireError {
    fn from(error: serde_cbor::Error) -> Self {
        WireError::Serde(error.to_string())
    }
}

/// Encode a value as self-described canonical CBOR. Canonicalization goes
/// through `serde_cbor::Value` so map ordering is stable regardless of the
/// field order the serializer happens to emit.
pub fn to_canonical_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(128);
    let canonical_value = serde_cbor::value::to_value(value)?;
    let mut serializer = serde_cbor::ser::Serializer::new(&mut buf);
    serializer.self_describe()?;
    canonical_value.serialize(&mut serializer)?;
    Ok(buf)
}

pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(serde_cbor::from_slice(bytes)?)
}

pub fn encode_envelope(envelope: &CommandEnvelope) -> Result<Vec<u8>, WireError> {
    to_canonical_cbor(envelope)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<CommandEnvelope, WireError> {
    from_cbor(bytes)
}

/// Blake3 hex digest of the canonical encoding, used by the replication
/// layer to deduplicate redelivered envelopes.
pub fn envelope_digest(envelope: &CommandEnvelope) -> Result<String, WireError> {
    let bytes = encode_envelope(envelope)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}
