//! The dispatcher actor: sole owner and mutator of the session state.
//!
//! Raw datagrams come in from the inbound pump, control messages from the
//! command interpreter. Each is applied to the [`SessionState`], the
//! resulting [`Transition`] is turned into side effects (keepalive,
//! ack echo, user events), and a fresh snapshot is published for readers.
//!
//! The dispatcher never waits on I/O: replies go onto the outbound queue
//! with `try_send`, and a full queue drops the reply with a warning.

use bytes::Bytes;
use ntetris_keepalive::KeepaliveScheduler;
use ntetris_protocol::{Envelope, Message, PROTOCOL_VERSION, RoomId, decode, encode};
use ntetris_session::{SessionState, Transition};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ClientEvent, NtetrisError};

/// State-changing intent forwarded by the command interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    /// A register-client request is being sent.
    Registering,
    /// A join-room request for this room is being sent.
    JoinRequested(RoomId),
}

pub(crate) struct Dispatcher {
    pub(crate) state: SessionState,
    pub(crate) keepalive: KeepaliveScheduler,
    pub(crate) inbound: mpsc::Receiver<Vec<u8>>,
    pub(crate) control: mpsc::Receiver<Control>,
    pub(crate) outbound: mpsc::Sender<Bytes>,
    pub(crate) snapshot: watch::Sender<SessionState>,
    pub(crate) events: mpsc::UnboundedSender<ClientEvent>,
    pub(crate) shutdown: CancellationToken,
}

impl Dispatcher {
    /// Runs until shutdown, then terminates the session.
    pub(crate) async fn run(mut self) -> Result<(), NtetrisError> {
        debug!("dispatcher started");

        let result = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break Ok(()),
                // A join intent must be recorded before its status reply.
                Some(control) = self.control.recv() => self.handle_control(control),
                Some(datagram) = self.inbound.recv() => {
                    if let Err(err) = self.handle_datagram(&datagram).await {
                        break Err(err);
                    }
                }
            }
        };

        self.terminate().await;
        debug!("dispatcher stopped");
        result
    }

    async fn handle_datagram(&mut self, datagram: &[u8]) -> Result<(), NtetrisError> {
        let envelope = match decode(datagram) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, len = datagram.len(), "dropping undecodable datagram");
                return Ok(());
            }
        };
        if envelope.version != PROTOCOL_VERSION {
            warn!(
                version = envelope.version,
                kind = %envelope.kind(),
                "dropping datagram with foreign protocol version"
            );
            return Ok(());
        }

        debug!(kind = %envelope.kind(), "dispatching");
        let transition = self.state.apply(envelope.message);
        self.react(transition).await?;
        self.publish();
        Ok(())
    }

    async fn react(&mut self, transition: Transition) -> Result<(), NtetrisError> {
        match transition {
            Transition::Registered {
                session_id,
                renewed,
            } => {
                // Every ack is echoed; the server uses it as a liveness probe.
                self.reply(Message::RegistrationAck { session_id })?;
                self.keepalive.start(session_id).await?;
                if !renewed {
                    self.emit(ClientEvent::Registered(session_id));
                }
            }
            Transition::Kicked { status, reason, .. } => {
                self.keepalive.stop().await;
                self.emit(ClientEvent::Kicked { status, reason });
            }
            Transition::Disconnected { session_id } => {
                self.keepalive.stop().await;
                self.emit(ClientEvent::Disconnected(session_id));
            }
            Transition::RoomAnnounced(room) => self.emit(ClientEvent::RoomAnnounced(room)),
            Transition::PeerJoined(peer) => self.emit(ClientEvent::PeerJoined(peer)),
            Transition::PeerParted(peer) => self.emit(ClientEvent::PeerParted(peer)),
            Transition::Chat {
                peer_id,
                name,
                text,
            } => self.emit(ClientEvent::Chat {
                peer_id,
                name,
                text,
            }),
            Transition::Status { code, joined } => {
                self.emit(ClientEvent::Status(code));
                if let Some(room) = joined {
                    self.emit(ClientEvent::JoinedRoom(room));
                }
            }
            Transition::MatchStarting => {
                info!("match starting");
                self.emit(ClientEvent::MatchStarting);
            }
            Transition::Gameplay(message) => self.gameplay(message),
            Transition::Ignored(kind) => debug!(%kind, "ignoring inbound message"),
        }
        Ok(())
    }

    fn gameplay(&self, message: Message) {
        let event = match message {
            Message::RegisterTetrad { shape } => ClientEvent::TetradRegistered { shape },
            Message::UpdateTetrad { x, y, x0, y0, rot } => {
                ClientEvent::TetradUpdated { x, y, x0, y0, rot }
            }
            Message::UpdateClientState {
                lines,
                score,
                level,
                status,
                changed_lines,
            } => ClientEvent::ClientStateUpdated {
                lines,
                score,
                level,
                status,
                changed_lines,
            },
            other => {
                debug!(kind = %other.kind(), "not a gameplay message");
                return;
            }
        };
        self.emit(event);
    }

    fn handle_control(&mut self, control: Control) {
        let outcome = match control {
            Control::Registering => self.state.begin_registration(),
            Control::JoinRequested(room) => self.state.request_join(room).map(drop),
        };
        match outcome {
            Ok(()) => debug!(?control, phase = ?self.state.phase(), "control applied"),
            // The interpreter checks against a snapshot that may be stale;
            // the state here is authoritative.
            Err(err) => debug!(?control, error = %err, "control ignored"),
        }
        self.publish();
    }

    async fn terminate(&mut self) {
        self.keepalive.stop().await;
        let farewell = self.state.terminate();
        self.publish();
        self.emit(ClientEvent::ShuttingDown { farewell });
    }

    /// Enqueues a reply without waiting.
    fn reply(&self, message: Message) -> Result<(), NtetrisError> {
        let kind = message.kind();
        let bytes = encode(&Envelope::new(message))?;
        match self.outbound.try_send(bytes) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%kind, "outbound queue full, dropping reply");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%kind, "outbound queue closed, dropping reply");
            }
        }
        Ok(())
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.state.clone());
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
