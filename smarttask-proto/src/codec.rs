//! Binary encoding for a persisted [`Session`].
//!
//! Wire format: `[u8 version][postcard payload]`. The version byte lets a
//! newer client refuse a file written by an incompatible one instead of
//! misreading it.

use crate::auth::Session;

/// Current session file format version.
pub const SESSION_FORMAT_VERSION: u8 = 2;

/// Error type for session encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The input was empty.
    #[error("empty session payload")]
    Empty,
    /// The version byte is not one this build understands.
    #[error("unsupported session format version {0}")]
    UnsupportedVersion(u8),
}

/// Encodes a [`Session`] into versioned bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the session cannot be serialized.
pub fn encode_session(session: &Session) -> Result<Vec<u8>, CodecError> {
    let payload =
        postcard::to_allocvec(session).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(SESSION_FORMAT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a [`Session`] from versioned bytes.
///
/// # Errors
///
/// Returns `CodecError::Empty` for empty input,
/// `CodecError::UnsupportedVersion` for an unknown version byte, or
/// `CodecError::Serialization` if the payload is corrupt.
pub fn decode_session(bytes: &[u8]) -> Result<Session, CodecError> {
    let (&version, payload) = bytes.split_first().ok_or(CodecError::Empty)?;
    if version != SESSION_FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    postcard::from_bytes(payload).map_err(|e| CodecError::Serialization(e.to_string()))
}
