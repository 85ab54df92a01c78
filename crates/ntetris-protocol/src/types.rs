//! Core protocol types for the ntetris wire format.
//!
//! Every datagram exchanged with the server is one [`Envelope`]: a two-byte
//! header (`version`, `kind`) followed by a kind-specific body. This module
//! defines the Rust side of that "language"; [`crate::codec`] turns it into
//! bytes and back.

use std::fmt;

/// The protocol version this client speaks. Stamped into every header by
/// [`Envelope::new`].
pub const PROTOCOL_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The server-assigned identifier of a registered session.
///
/// This is a "newtype wrapper" around the raw `u32` that travels on the
/// wire. Wrapping it means a `RoomId` can never be passed where a
/// `SessionId` is expected, even though both are 32-bit integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Identifies a room (a match lobby) advertised by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(pub u32);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifies another registered client (a peer). Peers are announced by
/// the server; on the wire a peer id is the peer's own session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl From<SessionId> for PeerId {
    fn from(id: SessionId) -> Self {
        Self(id.0)
    }
}

// ---------------------------------------------------------------------------
// Kind: the 1-byte discriminator
// ---------------------------------------------------------------------------

/// The one-byte tag in every header that selects the body layout.
///
/// `#[repr(u8)]` pins each variant to the listed discriminant, so
/// `Kind::Chat as u8` is exactly the byte that goes on the wire. Tag `10`
/// is intentionally absent: it belonged to a legacy kind without a settled
/// layout and is rejected as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    RegisterTetrad = 0,
    RegisterClient = 1,
    UpdateTetrad = 2,
    UpdateClientState = 3,
    DisconnectClient = 4,
    KickClient = 5,
    CreateRoom = 6,
    ListRooms = 7,
    RoomAnnounce = 8,
    JoinRoom = 9,
    Status = 11,
    RegistrationAck = 12,
    Ping = 13,
    PeerAnnounce = 14,
    Chat = 15,
}

impl Kind {
    /// Size of the fixed part of the body (everything except the
    /// variable-length bytes named by a length prefix).
    ///
    /// A buffer shorter than `HEADER_LEN + min_body_len()` can't be decoded
    /// at all and is reported as truncated.
    pub const fn min_body_len(self) -> usize {
        match self {
            Self::RegisterTetrad => 1,
            Self::RegisterClient => 1,
            Self::UpdateTetrad => 20,
            Self::UpdateClientState => 14,
            Self::DisconnectClient => 4,
            Self::KickClient => 3,
            Self::CreateRoom => 7,
            Self::ListRooms => 4,
            Self::RoomAnnounce => 8,
            Self::JoinRoom => 9,
            Self::Status => 1,
            Self::RegistrationAck => 4,
            Self::Ping => 4,
            Self::PeerAnnounce => 6,
            Self::Chat => 6,
        }
    }
}

impl TryFrom<u8> for Kind {
    /// The unrecognized tag is handed back so the caller can report it.
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            0 => Self::RegisterTetrad,
            1 => Self::RegisterClient,
            2 => Self::UpdateTetrad,
            3 => Self::UpdateClientState,
            4 => Self::DisconnectClient,
            5 => Self::KickClient,
            6 => Self::CreateRoom,
            7 => Self::ListRooms,
            8 => Self::RoomAnnounce,
            9 => Self::JoinRoom,
            11 => Self::Status,
            12 => Self::RegistrationAck,
            13 => Self::Ping,
            14 => Self::PeerAnnounce,
            15 => Self::Chat,
            other => return Err(other),
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RegisterTetrad => "register-tetrad",
            Self::RegisterClient => "register-client",
            Self::UpdateTetrad => "update-tetrad",
            Self::UpdateClientState => "update-client-state",
            Self::DisconnectClient => "disconnect-client",
            Self::KickClient => "kick-client",
            Self::CreateRoom => "create-room",
            Self::ListRooms => "list-rooms",
            Self::RoomAnnounce => "room-announce",
            Self::JoinRoom => "join-room",
            Self::Status => "status",
            Self::RegistrationAck => "registration-ack",
            Self::Ping => "ping",
            Self::PeerAnnounce => "peer-announce",
            Self::Chat => "chat",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// StatusCode: informational codes reported by the server
// ---------------------------------------------------------------------------

/// A status code carried by the error/status message.
///
/// These are not failures of this client; they are the server's verdict on
/// a previous request. Codes the client doesn't know are preserved in
/// [`StatusCode::Other`] so nothing is lost on a round trip.
///
/// Every byte has exactly one representation: `Other` can only hold a
/// code without a named variant, because [`UnknownStatus`] is only made
/// by `StatusCode::from(u8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    UnsupportedMessage,
    IllegalMessage,
    BadLength,
    BadProtocol,
    BadName,
    BadRoomName,
    Success,
    BadPassword,
    BadRoomNumber,
    BadPlayerCount,
    RoomFull,
    RoomSuccess,
    /// The server is handing this client off to a match.
    MatchStarting,
    Other(UnknownStatus),
}

/// A status byte outside the known table (13 and up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnknownStatus(u8);

impl UnknownStatus {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl StatusCode {
    /// The byte this code is encoded as.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::UnsupportedMessage => 0,
            Self::IllegalMessage => 1,
            Self::BadLength => 2,
            Self::BadProtocol => 3,
            Self::BadName => 4,
            Self::BadRoomName => 5,
            Self::Success => 6,
            Self::BadPassword => 7,
            Self::BadRoomNumber => 8,
            Self::BadPlayerCount => 9,
            Self::RoomFull => 10,
            Self::RoomSuccess => 11,
            Self::MatchStarting => 12,
            Self::Other(code) => code.get(),
        }
    }

    /// Human-readable text for the code. Unrecognized codes render as the
    /// generic `"error"` label.
    pub fn text(self) -> &'static str {
        match self {
            Self::UnsupportedMessage => "unsupported message",
            Self::IllegalMessage => "illegal message",
            Self::BadLength => "bad length",
            Self::BadProtocol => "bad protocol version",
            Self::BadName => "bad name",
            Self::BadRoomName => "bad room name",
            Self::Success => "success",
            Self::BadPassword => "bad password",
            Self::BadRoomNumber => "bad room number",
            Self::BadPlayerCount => "bad player count",
            Self::RoomFull => "room full",
            Self::RoomSuccess => "room operation succeeded",
            Self::MatchStarting => "match starting",
            Self::Other(_) => "error",
        }
    }
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::UnsupportedMessage,
            1 => Self::IllegalMessage,
            2 => Self::BadLength,
            3 => Self::BadProtocol,
            4 => Self::BadName,
            5 => Self::BadRoomName,
            6 => Self::Success,
            7 => Self::BadPassword,
            8 => Self::BadRoomNumber,
            9 => Self::BadPlayerCount,
            10 => Self::RoomFull,
            11 => Self::RoomSuccess,
            12 => Self::MatchStarting,
            other => Self::Other(UnknownStatus(other)),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.text(), self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// PeerStatus
// ---------------------------------------------------------------------------

/// Whether a peer-announce reports a join or a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerStatus {
    Joined,
    Parted,
    /// A status byte this client doesn't interpret. Treated as a join.
    Other(UnknownPeerStatus),
}

/// A peer-announce status byte other than 0 or 1. Only made by
/// `PeerStatus::from(u8)`, so `Other` never shadows `Joined` or `Parted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnknownPeerStatus(u8);

impl UnknownPeerStatus {
    pub fn get(self) -> u8 {
        self.0
    }
}

impl PeerStatus {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Joined => 0,
            Self::Parted => 1,
            Self::Other(status) => status.get(),
        }
    }
}

impl From<u8> for PeerStatus {
    fn from(status: u8) -> Self {
        match status {
            0 => Self::Joined,
            1 => Self::Parted,
            other => Self::Other(UnknownPeerStatus(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Message: one variant per kind
// ---------------------------------------------------------------------------

/// Every message the protocol defines, as a tagged union.
///
/// Decoding produces one of these variants *before* any business logic
/// runs, so handlers can `match` exhaustively instead of poking at raw
/// bytes. The comments give the body layout after the two-byte header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `shape: u8`
    RegisterTetrad { shape: u8 },

    /// `nameLen: u8, name`
    RegisterClient { name: String },

    /// `x, y, x0, y0, rot: i32`
    UpdateTetrad {
        x: i32,
        y: i32,
        x0: i32,
        y0: i32,
        rot: i32,
    },

    /// `lines, score, level: i32, status: u8, changeCount: u8,
    /// lineIndex: u16 * changeCount`
    UpdateClientState {
        lines: i32,
        score: i32,
        level: i32,
        status: u8,
        changed_lines: Vec<u16>,
    },

    /// `sessionId: u32`
    DisconnectClient { session_id: SessionId },

    /// `status: u8, reasonLen: u16, reason`
    KickClient { status: u8, reason: String },

    /// `sessionId: u32, maxPlayers: u8, nameLen: u8, passwordLen: u8,
    /// name + password`
    CreateRoom {
        session_id: SessionId,
        max_players: u8,
        name: String,
        password: String,
    },

    /// `sessionId: u32`
    ListRooms { session_id: SessionId },

    /// `roomId: u32, maxPlayers: u8, joinedPlayers: u8,
    /// passwordProtected: u8, nameLen: u8, name`
    RoomAnnounce {
        room_id: RoomId,
        max_players: u8,
        joined_players: u8,
        password_protected: bool,
        name: String,
    },

    /// `sessionId: u32, roomId: u32, passwordLen: u8, password`
    JoinRoom {
        session_id: SessionId,
        room_id: RoomId,
        password: String,
    },

    /// `code: u8`
    Status { code: StatusCode },

    /// `sessionId: u32`
    RegistrationAck { session_id: SessionId },

    /// `sessionId: u32`
    Ping { session_id: SessionId },

    /// `peerId: u32, nameLen: u8, status: u8, name`
    PeerAnnounce {
        peer_id: PeerId,
        status: PeerStatus,
        name: String,
    },

    /// `peerId: u32, textLen: u16, text`
    Chat { peer_id: PeerId, text: String },
}

impl Message {
    /// The kind tag this message is encoded with.
    pub fn kind(&self) -> Kind {
        match self {
            Self::RegisterTetrad { .. } => Kind::RegisterTetrad,
            Self::RegisterClient { .. } => Kind::RegisterClient,
            Self::UpdateTetrad { .. } => Kind::UpdateTetrad,
            Self::UpdateClientState { .. } => Kind::UpdateClientState,
            Self::DisconnectClient { .. } => Kind::DisconnectClient,
            Self::KickClient { .. } => Kind::KickClient,
            Self::CreateRoom { .. } => Kind::CreateRoom,
            Self::ListRooms { .. } => Kind::ListRooms,
            Self::RoomAnnounce { .. } => Kind::RoomAnnounce,
            Self::JoinRoom { .. } => Kind::JoinRoom,
            Self::Status { .. } => Kind::Status,
            Self::RegistrationAck { .. } => Kind::RegistrationAck,
            Self::Ping { .. } => Kind::Ping,
            Self::PeerAnnounce { .. } => Kind::PeerAnnounce,
            Self::Chat { .. } => Kind::Chat,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope: header + message
// ---------------------------------------------------------------------------

/// One datagram's worth of protocol: the version byte plus the message.
///
/// The kind byte isn't stored separately; it is always derived from the
/// message variant, so the two can never disagree.
///
/// ```text
/// ┌─────────┬──────┬──────────────────────────┐
/// │ version │ kind │ body (kind-specific)     │
/// │   u8    │  u8  │                          │
/// └─────────┴──────┴──────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u8,
    pub message: Message,
}

impl Envelope {
    /// Wraps a message with the current [`PROTOCOL_VERSION`].
    pub fn new(message: Message) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }

    pub fn kind(&self) -> Kind {
        self.message.kind()
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        Self::new(message)
    }
}

// =========================================================================
// Tests
// =========================================================================
