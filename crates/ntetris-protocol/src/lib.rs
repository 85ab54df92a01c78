//! Wire protocol for the ntetris client.
//!
//! This crate defines the "language" the client and the tetris server
//! speak over UDP:
//!
//! - **Types** ([`Envelope`], [`Message`], [`Kind`], [`StatusCode`], etc.)
//!   the message structures that travel on the wire.
//! - **Codec** ([`encode`], [`decode`]) how those messages are converted
//!   to and from datagrams.
//! - **Errors** ([`DecodeError`], [`EncodeError`], [`ProtocolError`]) what
//!   can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw datagrams) and session
//! (registration state). It knows nothing about sockets or sessions; it
//! only turns bytes into typed messages and back.
//!
//! ```text
//! Transport (datagram) → Protocol (Envelope) → Session (phase, rooms, peers)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{HEADER_LEN, decode, encode};
pub use error::{DecodeError, EncodeError, ProtocolError};
pub use types::{
    Envelope, Kind, Message, PROTOCOL_VERSION, PeerId, PeerStatus, RoomId,
    SessionId, StatusCode, UnknownPeerStatus, UnknownStatus,
};
