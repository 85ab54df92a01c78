//! Events the runtime reports to its user.
//!
//! Everything the client learns or decides ends up as a [`ClientEvent`] on
//! the output channel. The binary prints each one with its `Display`
//! rendering; tests match on the variants.

use std::fmt;

use ntetris_protocol::{PeerId, RoomId, SessionId, StatusCode};
use ntetris_session::{PeerSummary, RoomSummary};

use crate::command::{CommandError, HELP};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server acknowledged our registration.
    Registered(SessionId),
    /// A register-client request went out.
    RegistrationPending { name: String },
    Kicked { status: u8, reason: String },
    /// The server dropped our session with a disconnect of its own.
    Disconnected(SessionId),
    RoomAnnounced(RoomSummary),
    PeerJoined(PeerSummary),
    PeerParted(PeerSummary),
    /// A chat line. `name` is `None` when the sender was never announced.
    Chat {
        peer_id: PeerId,
        name: Option<String>,
        text: String,
    },
    Status(StatusCode),
    MatchStarting,
    TetradRegistered { shape: u8 },
    TetradUpdated {
        x: i32,
        y: i32,
        x0: i32,
        y0: i32,
        rot: i32,
    },
    ClientStateUpdated {
        lines: i32,
        score: i32,
        level: i32,
        status: u8,
        changed_lines: Vec<u16>,
    },
    /// Answer to the local `rooms` command.
    RoomList(Vec<RoomSummary>),
    /// Answer to the local `peers` command.
    PeerList(Vec<PeerSummary>),
    JoinedRoom(RoomId),
    /// A command was refused before anything was sent.
    Rejected(CommandError),
    Help,
    /// The runtime is stopping. `farewell` is the session a disconnect
    /// will be sent for.
    ShuttingDown { farewell: Option<SessionId> },
}

fn write_room(f: &mut fmt::Formatter<'_>, room: &RoomSummary) -> fmt::Result {
    write!(
        f,
        "#{} {} ({}/{})",
        room.room_id.0, room.name, room.joined_players, room.max_players
    )?;
    if room.password_protected {
        f.write_str(" [password]")?;
    }
    Ok(())
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered(id) => write!(f, "registered as session {}", id.0),
            Self::RegistrationPending { name } => write!(f, "registering as {name}..."),
            Self::Kicked { status, reason } if reason.is_empty() => {
                write!(f, "kicked by server (status {status})")
            }
            Self::Kicked { status, reason } => {
                write!(f, "kicked by server (status {status}): {reason}")
            }
            Self::Disconnected(id) => write!(f, "session {} disconnected by server", id.0),
            Self::RoomAnnounced(room) => {
                f.write_str("room ")?;
                write_room(f, room)
            }
            Self::PeerJoined(peer) => write!(f, "{} joined", peer.name),
            Self::PeerParted(peer) => write!(f, "{} left", peer.name),
            Self::Chat {
                name: Some(name),
                text,
                ..
            } => write!(f, "<{name}> {text}"),
            Self::Chat {
                peer_id,
                name: None,
                text,
            } => write!(f, "<unknown #{}> {text}", peer_id.0),
            Self::Status(code) => write!(f, "server: {code}"),
            Self::MatchStarting => f.write_str("match starting"),
            Self::TetradRegistered { shape } => write!(f, "tetrad registered (shape {shape})"),
            Self::TetradUpdated { x, y, x0, y0, rot } => {
                write!(f, "tetrad moved ({x0},{y0}) -> ({x},{y}) rot {rot}")
            }
            Self::ClientStateUpdated {
                lines,
                score,
                level,
                status,
                changed_lines,
            } => write!(
                f,
                "lines {lines} score {score} level {level} status {status} ({} rows changed)",
                changed_lines.len()
            ),
            Self::RoomList(rooms) if rooms.is_empty() => f.write_str("no rooms known"),
            Self::RoomList(rooms) => {
                for (i, room) in rooms.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write_room(f, room)?;
                }
                Ok(())
            }
            Self::PeerList(peers) if peers.is_empty() => f.write_str("no peers known"),
            Self::PeerList(peers) => {
                for (i, peer) in peers.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    let here = if peer.present { "" } else { " (left)" };
                    write!(f, "#{} {}{here}", peer.peer_id.0, peer.name)?;
                }
                Ok(())
            }
            Self::JoinedRoom(room) => write!(f, "joined room #{}", room.0),
            Self::Rejected(err) => write!(f, "rejected: {err}"),
            Self::Help => f.write_str(HELP),
            Self::ShuttingDown { farewell: Some(id) } => {
                write!(f, "shutting down, leaving session {}", id.0)
            }
            Self::ShuttingDown { farewell: None } => f.write_str("shutting down"),
        }
    }
}
