//! Line-oriented user commands and the interpreter actor that runs them.
//!
//! Each input line parses into a [`Command`]. The interpreter checks it
//! against the latest session snapshot and either enqueues the matching
//! protocol message or reports a rejection. It never mutates session
//! state itself; intent that changes state (registering, joining a room)
//! is forwarded to the dispatcher as a control message.

use std::str::FromStr;

use bytes::Bytes;
use ntetris_protocol::{EncodeError, Envelope, Message, RoomId, SessionId, encode};
use ntetris_session::{SessionError, SessionPhase, SessionState};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatcher::Control;
use crate::{ClientEvent, NtetrisError};

/// Text shown by the `help` command.
pub const HELP: &str = "\
commands:
  register                      register with the server
  rooms                         list rooms announced so far
  refresh | list                ask the server to announce its rooms
  create <max> <name> [pass]    create a room
  join <id> [pass]              join a room
  say <text> | chat <text>      send a chat line
  peers                         list peers announced so far
  help                          show this text
  quit                          disconnect and exit";

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register,
    /// Show the local room directory. Needs no registration.
    Rooms,
    /// Ask the server to (re)announce its rooms.
    Refresh,
    Create {
        max_players: u8,
        name: String,
        password: String,
    },
    Join {
        room_id: RoomId,
        password: String,
    },
    Say(String),
    Peers,
    Help,
    Quit,
}

/// Why a line couldn't be turned into protocol traffic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {what}: `{value}`")]
    InvalidArgument { what: &'static str, value: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));
        let args: Vec<&str> = rest.split_whitespace().collect();

        let no_args = |cmd: Command, usage: &'static str| {
            if args.is_empty() {
                Ok(cmd)
            } else {
                Err(CommandError::Usage(usage))
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "register" => no_args(Self::Register, "register"),
            "rooms" => no_args(Self::Rooms, "rooms"),
            "refresh" | "list" => no_args(Self::Refresh, "refresh"),
            "peers" => no_args(Self::Peers, "peers"),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),

            "create" => {
                const USAGE: &str = "create <max> <name> [password]";
                let [max, name, password @ ..] = args.as_slice() else {
                    return Err(CommandError::Usage(USAGE));
                };
                if password.len() > 1 {
                    return Err(CommandError::Usage(USAGE));
                }
                let max_players = max.parse().map_err(|_| CommandError::InvalidArgument {
                    what: "player count",
                    value: (*max).to_owned(),
                })?;
                Ok(Self::Create {
                    max_players,
                    name: (*name).to_owned(),
                    password: password.first().map_or_else(String::new, |p| (*p).to_owned()),
                })
            }

            "join" => {
                const USAGE: &str = "join <id> [password]";
                let [id, password @ ..] = args.as_slice() else {
                    return Err(CommandError::Usage(USAGE));
                };
                if password.len() > 1 {
                    return Err(CommandError::Usage(USAGE));
                }
                let room_id = id
                    .trim_start_matches('#')
                    .parse()
                    .map(RoomId)
                    .map_err(|_| CommandError::InvalidArgument {
                        what: "room id",
                        value: (*id).to_owned(),
                    })?;
                Ok(Self::Join {
                    room_id,
                    password: password.first().map_or_else(String::new, |p| (*p).to_owned()),
                })
            }

            "say" | "chat" => {
                if rest.is_empty() {
                    Err(CommandError::Usage("say <text>"))
                } else {
                    Ok(Self::Say(rest.to_owned()))
                }
            }

            _ => Err(CommandError::Unknown(word.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// Interpreter actor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Turns input lines into outbound traffic, gated by the session snapshot.
pub(crate) struct CommandInterpreter {
    pub(crate) display_name: String,
    pub(crate) register_on_start: bool,
    pub(crate) lines: mpsc::Receiver<String>,
    pub(crate) outbound: mpsc::Sender<Bytes>,
    pub(crate) control: mpsc::Sender<Control>,
    pub(crate) snapshot: watch::Receiver<SessionState>,
    pub(crate) events: mpsc::UnboundedSender<ClientEvent>,
    pub(crate) shutdown: CancellationToken,
}

impl CommandInterpreter {
    /// Runs until `quit`, end of input, or shutdown.
    pub(crate) async fn run(mut self) -> Result<(), NtetrisError> {
        if self.register_on_start && self.execute(Command::Register).await? == Flow::Quit {
            return Ok(());
        }

        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                line = self.lines.recv() => line,
            };

            let Some(line) = line else {
                info!("input closed, shutting down");
                self.shutdown.cancel();
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let flow = match line.parse::<Command>() {
                Ok(command) => {
                    debug!(?command, "command");
                    self.execute(command).await?
                }
                Err(err) => {
                    self.emit(ClientEvent::Rejected(err));
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break;
            }
        }

        debug!("command interpreter stopped");
        Ok(())
    }

    async fn execute(&mut self, command: Command) -> Result<Flow, NtetrisError> {
        match command {
            Command::Register => {
                let phase = self.snapshot.borrow().phase();
                if let SessionPhase::Registered(id) = phase {
                    self.reject(SessionError::AlreadyRegistered(id));
                    return Ok(Flow::Continue);
                }
                let message = Message::RegisterClient {
                    name: self.display_name.clone(),
                };
                let Some(bytes) = self.encode(message) else {
                    return Ok(Flow::Continue);
                };
                if self.notify(Control::Registering).await? == Flow::Quit {
                    return Ok(Flow::Quit);
                }
                let flow = self.push(bytes).await?;
                self.emit(ClientEvent::RegistrationPending {
                    name: self.display_name.clone(),
                });
                Ok(flow)
            }

            Command::Rooms => {
                let rooms = self.snapshot.borrow().rooms().sorted().into_iter().cloned().collect();
                self.emit(ClientEvent::RoomList(rooms));
                Ok(Flow::Continue)
            }

            Command::Peers => {
                let peers = self.snapshot.borrow().peers().sorted().into_iter().cloned().collect();
                self.emit(ClientEvent::PeerList(peers));
                Ok(Flow::Continue)
            }

            Command::Refresh => {
                self.send_registered(|session_id| Message::ListRooms { session_id })
                    .await
            }

            Command::Create {
                max_players,
                name,
                password,
            } => {
                self.send_registered(|session_id| Message::CreateRoom {
                    session_id,
                    max_players,
                    name,
                    password,
                })
                .await
            }

            Command::Join { room_id, password } => {
                let Some(session_id) = self.session_or_reject() else {
                    return Ok(Flow::Continue);
                };
                let message = Message::JoinRoom {
                    session_id,
                    room_id,
                    password,
                };
                let Some(bytes) = self.encode(message) else {
                    return Ok(Flow::Continue);
                };
                if self.notify(Control::JoinRequested(room_id)).await? == Flow::Quit {
                    return Ok(Flow::Quit);
                }
                self.push(bytes).await
            }

            Command::Say(text) => {
                self.send_registered(|session_id| Message::Chat {
                    peer_id: session_id.into(),
                    text,
                })
                .await
            }

            Command::Help => {
                self.emit(ClientEvent::Help);
                Ok(Flow::Continue)
            }

            Command::Quit => {
                info!("quit requested");
                self.shutdown.cancel();
                Ok(Flow::Quit)
            }
        }
    }

    /// Builds and enqueues a message that needs a registered session.
    async fn send_registered(
        &mut self,
        build: impl FnOnce(SessionId) -> Message,
    ) -> Result<Flow, NtetrisError> {
        let Some(session_id) = self.session_or_reject() else {
            return Ok(Flow::Continue);
        };
        match self.encode(build(session_id)) {
            Some(bytes) => self.push(bytes).await,
            None => Ok(Flow::Continue),
        }
    }

    fn session_or_reject(&self) -> Option<SessionId> {
        let registered = self.snapshot.borrow().require_registered();
        match registered {
            Ok(id) => Some(id),
            Err(err) => {
                self.reject(err);
                None
            }
        }
    }

    fn encode(&self, message: Message) -> Option<Bytes> {
        match encode(&Envelope::new(message)) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                self.reject(err);
                None
            }
        }
    }

    /// Enqueues onto the outbound channel, waiting for room but giving up
    /// on shutdown.
    async fn push(&self, bytes: Bytes) -> Result<Flow, NtetrisError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(Flow::Quit),
            sent = self.outbound.send(bytes) => match sent {
                Ok(()) => Ok(Flow::Continue),
                Err(_) => self.closed("outbound"),
            },
        }
    }

    async fn notify(&self, control: Control) -> Result<Flow, NtetrisError> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(Flow::Quit),
            sent = self.control.send(control) => match sent {
                Ok(()) => Ok(Flow::Continue),
                Err(_) => self.closed("control"),
            },
        }
    }

    fn closed(&self, channel: &'static str) -> Result<Flow, NtetrisError> {
        if self.shutdown.is_cancelled() {
            Ok(Flow::Quit)
        } else {
            Err(NtetrisError::ChannelClosed(channel))
        }
    }

    fn reject(&self, err: impl Into<CommandError>) {
        let err = err.into();
        debug!(error = %err, "command rejected");
        self.emit(ClientEvent::Rejected(err));
    }

    fn emit(&self, event: ClientEvent) {
        // Nobody listening is fine; the runtime keeps going.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        line.parse()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse("register"), Ok(Command::Register));
        assert_eq!(parse("rooms"), Ok(Command::Rooms));
        assert_eq!(parse("refresh"), Ok(Command::Refresh));
        assert_eq!(parse("list"), Ok(Command::Refresh));
        assert_eq!(parse("peers"), Ok(Command::Peers));
        assert_eq!(parse("help"), Ok(Command::Help));
        assert_eq!(parse("quit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(parse("  QUIT \n"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_create_without_password() {
        assert_eq!(
            parse("create 4 lobby"),
            Ok(Command::Create {
                max_players: 4,
                name: "lobby".into(),
                password: String::new(),
            })
        );
    }

    #[test]
    fn test_parse_create_with_password() {
        assert_eq!(
            parse("create 2 duel secret"),
            Ok(Command::Create {
                max_players: 2,
                name: "duel".into(),
                password: "secret".into(),
            })
        );
    }

    #[test]
    fn test_parse_create_bad_count_is_invalid_argument() {
        assert_eq!(
            parse("create many lobby"),
            Err(CommandError::InvalidArgument {
                what: "player count",
                value: "many".into(),
            })
        );
        assert!(matches!(
            parse("create 300 lobby"),
            Err(CommandError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_parse_create_missing_name_is_usage() {
        assert!(matches!(parse("create 4"), Err(CommandError::Usage(_))));
        assert!(matches!(
            parse("create 4 a b c"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_parse_join_with_and_without_password() {
        assert_eq!(
            parse("join 3"),
            Ok(Command::Join {
                room_id: RoomId(3),
                password: String::new(),
            })
        );
        assert_eq!(
            parse("join #3 pw"),
            Ok(Command::Join {
                room_id: RoomId(3),
                password: "pw".into(),
            })
        );
    }

    #[test]
    fn test_parse_join_bad_id_is_invalid_argument() {
        assert!(matches!(
            parse("join three"),
            Err(CommandError::InvalidArgument { what: "room id", .. })
        ));
    }

    #[test]
    fn test_parse_say_keeps_inner_spacing() {
        assert_eq!(
            parse("say hello   there"),
            Ok(Command::Say("hello   there".into()))
        );
        assert_eq!(parse("chat gg"), Ok(Command::Say("gg".into())));
    }

    #[test]
    fn test_parse_say_without_text_is_usage() {
        assert_eq!(parse("say"), Err(CommandError::Usage("say <text>")));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(parse("dance"), Err(CommandError::Unknown("dance".into())));
    }

    #[test]
    fn test_parse_extra_args_on_simple_command_is_usage() {
        assert_eq!(parse("rooms now"), Err(CommandError::Usage("rooms")));
    }
}
