//! Unified error type for the ntetris client.

use ntetris_protocol::{DecodeError, EncodeError, ProtocolError};
use ntetris_session::SessionError;
use ntetris_transport::TransportError;

use crate::command::CommandError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `ntetris` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NtetrisError {
    /// A transport-level error (bind, send, receive). Fatal.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (not registered, already registered).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A user command couldn't be parsed or executed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// An internal channel closed while its actor still needed it.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    /// A runtime actor panicked or was cancelled.
    #[error("actor task failed: {0}")]
    Actor(#[from] tokio::task::JoinError),
}

impl From<EncodeError> for NtetrisError {
    fn from(err: EncodeError) -> Self {
        Self::Protocol(err.into())
    }
}

impl From<DecodeError> for NtetrisError {
    fn from(err: DecodeError) -> Self {
        Self::Protocol(err.into())
    }
}
