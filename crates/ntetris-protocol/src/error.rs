//! Error types for the protocol layer.
//!
//! Encoding and decoding fail for different reasons, so each direction has
//! its own enum. [`ProtocolError`] unifies them for callers that only care
//! that "the codec said no".

use crate::Kind;

/// Why a datagram could not be decoded into an [`Envelope`](crate::Envelope).
///
/// All three are local faults: the datagram is dropped and the session
/// carries on. None of them is ever reported back to the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The buffer is shorter than the header plus the kind's fixed body.
    #[error("truncated datagram: need at least {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// A length prefix points past the end of the buffer, or bytes are
    /// left over after the declared layout.
    #[error("length mismatch: layout declares {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// The kind tag is outside the defined set.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),
}

/// Why a message could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A variable-length field doesn't fit in its length prefix
    /// (255 for one-byte prefixes, 65535 for two-byte prefixes).
    #[error("{kind}: field `{field}` is {len} long, limit is {max}")]
    FieldTooLong {
        kind: Kind,
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Either direction of codec failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}
