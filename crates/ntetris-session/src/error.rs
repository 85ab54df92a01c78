//! Error types for the session layer.

use ntetris_protocol::SessionId;

/// Why a session operation was refused.
///
/// These are local verdicts: the operation is rejected before anything is
/// sent, and the caller reports it to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The operation needs a server-acknowledged session and there isn't
    /// one yet (or it was kicked).
    #[error("not registered with the server")]
    NotRegistered,

    /// A registration was requested while already registered.
    #[error("already registered as session {0}")]
    AlreadyRegistered(SessionId),

    /// The runtime is shutting down; no further state changes are made.
    #[error("session terminated")]
    Terminated,
}
