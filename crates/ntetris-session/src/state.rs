//! The session state machine.
//!
//! [`SessionState`] is owned by exactly one task (the runtime's
//! dispatcher). Everything else sees clones of it. Each inbound message is
//! applied with [`SessionState::apply`], which mutates the state and
//! returns a [`Transition`] describing what happened so the owner can
//! perform the side effects (start a keepalive, echo an ack, tell the user).

use ntetris_protocol::{Kind, Message, PeerId, PeerStatus, RoomId, SessionId, StatusCode};

use crate::{PeerDirectory, PeerSummary, RoomDirectory, RoomSummary, SessionError};

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where this client stands with the server.
///
/// ```text
///   Unregistered ──(register sent)──→ AwaitingAck ──(ack)──→ Registered(id)
///        ↑                                                        │
///        └──────────────────(kick / server disconnect)────────────┘
///
///   any phase ──(local shutdown)──→ Terminated { last_session }
/// ```
///
/// There's no timeout out of `AwaitingAck`; retrying is up to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unregistered,
    AwaitingAck,
    Registered(SessionId),
    /// The runtime is shutting down. `last_session` is the id that was
    /// registered at that moment, if any; it is what the farewell
    /// disconnect carries.
    Terminated { last_session: Option<SessionId> },
}

impl SessionPhase {
    /// The active session id. `Some` exactly when registered.
    pub fn session_id(self) -> Option<SessionId> {
        match self {
            Self::Registered(id) => Some(id),
            _ => None,
        }
    }

    pub fn registered(self) -> bool {
        self.session_id().is_some()
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// The outcome of applying one inbound message.
///
/// Exactly one of these is produced per message. They carry enough data
/// for the owner to act without re-reading the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A registration-ack was accepted. `renewed` is `true` when the same
    /// session was already registered (a repeated ack).
    Registered { session_id: SessionId, renewed: bool },

    /// The server forcibly removed this client. `session` is the id that
    /// was registered, if any.
    Kicked {
        status: u8,
        reason: String,
        session: Option<SessionId>,
    },

    /// The server sent a disconnect for our own session.
    Disconnected { session_id: SessionId },

    RoomAnnounced(RoomSummary),
    PeerJoined(PeerSummary),
    PeerParted(PeerSummary),

    /// A chat line. `name` is `None` if the sender was never announced.
    Chat {
        peer_id: PeerId,
        name: Option<String>,
        text: String,
    },

    /// A status code from the server. `joined` is set when the code
    /// completed a pending room join.
    Status {
        code: StatusCode,
        joined: Option<RoomId>,
    },

    /// The server is handing this client off to a match.
    MatchStarting,

    /// Tetrad or client-state updates. No session field tracks them; they
    /// are passed through for the gameplay layer.
    Gameplay(Message),

    /// Nothing changed: the message isn't meaningful in this direction or
    /// in the current phase.
    Ignored(Kind),
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The client's view of its session: phase, current room and the room
/// and peer directories.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    phase: SessionPhase,
    /// Only ever `Some` while registered.
    current_room: Option<RoomId>,
    /// A join-room request sent and not yet answered.
    pending_join: Option<RoomId>,
    rooms: RoomDirectory,
    peers: PeerDirectory,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.phase.session_id()
    }

    pub fn registered(&self) -> bool {
        self.phase.registered()
    }

    pub fn current_room(&self) -> Option<RoomId> {
        self.current_room
    }

    pub fn pending_join(&self) -> Option<RoomId> {
        self.pending_join
    }

    pub fn rooms(&self) -> &RoomDirectory {
        &self.rooms
    }

    pub fn peers(&self) -> &PeerDirectory {
        &self.peers
    }

    /// The session a shutdown disconnect should name: the registered id,
    /// or the id held when the runtime terminated.
    pub fn farewell_session(&self) -> Option<SessionId> {
        match self.phase {
            SessionPhase::Registered(id) => Some(id),
            SessionPhase::Terminated { last_session } => last_session,
            _ => None,
        }
    }

    /// Returns the session id, or [`SessionError::NotRegistered`].
    pub fn require_registered(&self) -> Result<SessionId, SessionError> {
        match self.phase {
            SessionPhase::Registered(id) => Ok(id),
            SessionPhase::Terminated { .. } => Err(SessionError::Terminated),
            _ => Err(SessionError::NotRegistered),
        }
    }

    // -----------------------------------------------------------------------
    // Local intent
    // -----------------------------------------------------------------------

    /// Notes that a register-client request has been sent.
    ///
    /// Repeating it while still awaiting an ack is fine (the first request
    /// may have been lost).
    pub fn begin_registration(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Unregistered | SessionPhase::AwaitingAck => {
                self.phase = SessionPhase::AwaitingAck;
                Ok(())
            }
            SessionPhase::Registered(id) => Err(SessionError::AlreadyRegistered(id)),
            SessionPhase::Terminated { .. } => Err(SessionError::Terminated),
        }
    }

    /// Notes that a join-room request for `room_id` has been sent. The
    /// current room changes only when the server confirms.
    pub fn request_join(&mut self, room_id: RoomId) -> Result<SessionId, SessionError> {
        let session_id = self.require_registered()?;
        self.pending_join = Some(room_id);
        Ok(session_id)
    }

    /// Moves to [`SessionPhase::Terminated`] and returns the farewell
    /// session id. Calling it again returns the same id.
    pub fn terminate(&mut self) -> Option<SessionId> {
        if let SessionPhase::Terminated { last_session } = self.phase {
            return last_session;
        }
        let last_session = self.session_id();
        self.phase = SessionPhase::Terminated { last_session };
        self.current_room = None;
        self.pending_join = None;
        tracing::info!(session = ?last_session, "session terminated");
        last_session
    }

    fn clear_registration(&mut self) {
        self.phase = SessionPhase::Unregistered;
        self.current_room = None;
        self.pending_join = None;
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    /// Applies one decoded inbound message.
    ///
    /// Announces are idempotent upserts, so duplicated or reordered
    /// datagrams leave the directories consistent. Once terminated, only
    /// the directories still update; the phase no longer changes.
    pub fn apply(&mut self, message: Message) -> Transition {
        let kind = message.kind();
        let terminated = matches!(self.phase, SessionPhase::Terminated { .. });

        match message {
            Message::RegistrationAck { session_id } => {
                if terminated {
                    return Transition::Ignored(kind);
                }
                let renewed = self.phase == SessionPhase::Registered(session_id);
                if !renewed {
                    // A different id means the server started a new
                    // session for us; nothing from the old one carries over.
                    self.current_room = None;
                    self.pending_join = None;
                    tracing::info!(%session_id, "registered");
                }
                self.phase = SessionPhase::Registered(session_id);
                Transition::Registered {
                    session_id,
                    renewed,
                }
            }

            Message::KickClient { status, reason } => {
                if terminated {
                    return Transition::Ignored(kind);
                }
                let session = self.session_id();
                self.clear_registration();
                tracing::info!(?session, status, %reason, "kicked by server");
                Transition::Kicked {
                    status,
                    reason,
                    session,
                }
            }

            Message::DisconnectClient { session_id } => {
                if self.session_id() != Some(session_id) {
                    return Transition::Ignored(kind);
                }
                self.clear_registration();
                tracing::info!(%session_id, "disconnected by server");
                Transition::Disconnected { session_id }
            }

            Message::RoomAnnounce {
                room_id,
                max_players,
                joined_players,
                password_protected,
                name,
            } => {
                let room = RoomSummary {
                    room_id,
                    max_players,
                    joined_players,
                    password_protected,
                    name,
                };
                self.rooms.upsert(room.clone());
                Transition::RoomAnnounced(room)
            }

            Message::PeerAnnounce {
                peer_id,
                status,
                name,
            } => match status {
                PeerStatus::Parted => {
                    Transition::PeerParted(self.peers.part(peer_id, name).clone())
                }
                PeerStatus::Joined | PeerStatus::Other(_) => {
                    Transition::PeerJoined(self.peers.join(peer_id, name).clone())
                }
            },

            Message::Chat { peer_id, text } => Transition::Chat {
                peer_id,
                name: self.peers.name_of(peer_id).map(str::to_owned),
                text,
            },

            Message::Status { code } => {
                if code == StatusCode::MatchStarting {
                    return Transition::MatchStarting;
                }
                // Any answer settles a pending join; only a room success
                // while still registered makes it the current room.
                let pending = self.pending_join.take();
                let joined = match (code, pending) {
                    (StatusCode::RoomSuccess, Some(room)) if self.registered() => {
                        self.current_room = Some(room);
                        tracing::info!(%room, "joined room");
                        Some(room)
                    }
                    _ => None,
                };
                Transition::Status { code, joined }
            }

            gameplay @ (Message::RegisterTetrad { .. }
            | Message::UpdateTetrad { .. }
            | Message::UpdateClientState { .. }) => Transition::Gameplay(gameplay),

            // Client-to-server requests have no meaning inbound.
            Message::RegisterClient { .. }
            | Message::CreateRoom { .. }
            | Message::ListRooms { .. }
            | Message::JoinRoom { .. }
            | Message::Ping { .. } => Transition::Ignored(kind),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
