//! Integration tests for the full client runtime.
//!
//! Each test runs a real [`Client`] over a [`MemoryTransport`] and plays
//! the server through the [`MemoryPeer`] end: it reads what the client
//! sends and delivers hand-built datagrams back. The clock is paused, so
//! keepalive periods and poll timeouts elapse instantly and exactly.

use std::time::Duration;

use ntetris::prelude::*;
use ntetris::transport::pair;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

// =========================================================================
// Harness
// =========================================================================

const WAIT: Duration = Duration::from_secs(30);

struct Harness {
    peer: MemoryPeer,
    lines: mpsc::Sender<String>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    snapshot: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    task: JoinHandle<Result<(), NtetrisError>>,
}

fn start(register_on_start: bool) -> Harness {
    let (transport, peer) = pair();
    let client = ClientBuilder::new("Bob")
        .poll_interval(Duration::from_millis(20))
        .send_spacing(Duration::ZERO)
        .register_on_start(register_on_start)
        .build(transport);

    let snapshot = client.subscribe();
    let shutdown = client.shutdown_token();
    let (lines, lines_rx) = mpsc::channel(16);
    let (events_tx, events) = mpsc::unbounded_channel();
    let task = tokio::spawn(client.run(lines_rx, events_tx));

    Harness {
        peer,
        lines,
        events,
        snapshot,
        shutdown,
        task,
    }
}

impl Harness {
    /// Delivers a message from the "server".
    fn deliver(&self, message: Message) {
        let bytes = encode(&Envelope::new(message)).expect("test message should encode");
        assert!(self.peer.deliver(bytes.to_vec()));
    }

    async fn command(&self, line: &str) {
        self.lines.send(line.to_owned()).await.expect("client should accept input");
    }

    /// Next datagram the client wrote, decoded.
    async fn next_message(&mut self) -> Message {
        let frame = time::timeout(WAIT, self.peer.next_frame())
            .await
            .expect("client should send in time")
            .expect("client transport should be alive");
        match frame {
            MemoryFrame::Datagram(bytes) => decode(&bytes).expect("client output should decode").message,
            MemoryFrame::Closed => panic!("transport closed while waiting for a datagram"),
        }
    }

    /// Skips events until one matches.
    async fn wait_event(&mut self, pred: impl Fn(&ClientEvent) -> bool) -> ClientEvent {
        loop {
            let event = time::timeout(WAIT, self.events.recv())
                .await
                .expect("event should arrive in time")
                .expect("event channel should be open");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Registers as `id`: consumes the register request, acks it, and
    /// consumes the ack echo and first ping.
    async fn register(&mut self, id: u32) {
        assert_eq!(
            self.next_message().await,
            Message::RegisterClient { name: "Bob".into() }
        );
        self.deliver(Message::RegistrationAck {
            session_id: SessionId(id),
        });
        self.wait_event(|e| matches!(e, ClientEvent::Registered(_))).await;
        assert_eq!(
            self.next_message().await,
            Message::RegistrationAck {
                session_id: SessionId(id)
            }
        );
        assert_eq!(
            self.next_message().await,
            Message::Ping {
                session_id: SessionId(id)
            }
        );
    }

    /// Waits for the runtime to finish and returns every frame the client
    /// wrote that wasn't read yet.
    async fn finish(mut self) -> (Result<(), NtetrisError>, Vec<MemoryFrame>) {
        let result = time::timeout(WAIT, self.task)
            .await
            .expect("client should stop in time")
            .expect("client task should not panic");
        (result, self.peer.drain())
    }
}

fn is_ping(frame: &MemoryFrame) -> bool {
    match frame {
        MemoryFrame::Datagram(bytes) => {
            matches!(decode(bytes).map(|e| e.message), Ok(Message::Ping { .. }))
        }
        MemoryFrame::Closed => false,
    }
}

fn disconnect(id: u32) -> MemoryFrame {
    let bytes = encode(&Envelope::new(Message::DisconnectClient {
        session_id: SessionId(id),
    }))
    .unwrap();
    MemoryFrame::Datagram(bytes.to_vec())
}

// =========================================================================
// Registration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_run_registers_on_start_with_display_name() {
    let mut h = start(true);

    let frame = time::timeout(WAIT, h.peer.next_frame()).await.unwrap().unwrap();
    assert_eq!(
        frame,
        MemoryFrame::Datagram(vec![0x01, 0x01, 0x03, 0x42, 0x6F, 0x62])
    );

    let event = h
        .wait_event(|e| matches!(e, ClientEvent::RegistrationPending { .. }))
        .await;
    assert_eq!(event, ClientEvent::RegistrationPending { name: "Bob".into() });
}

#[tokio::test(start_paused = true)]
async fn test_ack_enters_registered_echoes_and_pings() {
    let mut h = start(true);
    h.register(7).await;

    assert_eq!(h.snapshot.borrow().phase(), SessionPhase::Registered(SessionId(7)));
    assert_eq!(h.snapshot.borrow().session_id(), Some(SessionId(7)));

    // Keepalive keeps going every two seconds.
    time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(
        h.next_message().await,
        Message::Ping {
            session_id: SessionId(7)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_ack_does_not_start_second_keepalive() {
    let mut h = start(true);
    h.register(7).await;

    h.deliver(Message::RegistrationAck {
        session_id: SessionId(7),
    });
    assert_eq!(
        h.next_message().await,
        Message::RegistrationAck {
            session_id: SessionId(7)
        }
    );

    // One stream pings at 2s and 4s; two streams would double that.
    time::sleep(Duration::from_secs(5)).await;
    let frames = h.peer.drain();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(is_ping));

    h.shutdown.cancel();
    let (result, _) = h.finish().await;
    assert!(result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_register_command_while_registered_is_rejected() {
    let mut h = start(true);
    h.register(7).await;

    h.command("register").await;
    let event = h.wait_event(|e| matches!(e, ClientEvent::Rejected(_))).await;
    assert_eq!(
        event,
        ClientEvent::Rejected(CommandError::Session(SessionError::AlreadyRegistered(
            SessionId(7)
        )))
    );
}

#[tokio::test(start_paused = true)]
async fn test_register_command_sends_request_when_not_auto_registering() {
    let mut h = start(false);
    h.command("register").await;
    h.register(4).await;
    assert!(h.snapshot.borrow().registered());
}

// =========================================================================
// Kick
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_kick_clears_session_and_stops_keepalive() {
    let mut h = start(true);
    h.register(5).await;

    h.deliver(Message::KickClient {
        status: 0,
        reason: "server full".into(),
    });
    let event = h.wait_event(|e| matches!(e, ClientEvent::Kicked { .. })).await;
    assert_eq!(
        event,
        ClientEvent::Kicked {
            status: 0,
            reason: "server full".into()
        }
    );
    assert_eq!(h.snapshot.borrow().phase(), SessionPhase::Unregistered);
    assert_eq!(h.snapshot.borrow().current_room(), None);

    time::sleep(Duration::from_secs(10)).await;
    assert!(h.peer.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_disconnect_for_own_session_stops_keepalive() {
    let mut h = start(true);
    h.register(5).await;

    h.deliver(Message::DisconnectClient {
        session_id: SessionId(5),
    });
    let event = h
        .wait_event(|e| matches!(e, ClientEvent::Disconnected(_)))
        .await;
    assert_eq!(event, ClientEvent::Disconnected(SessionId(5)));
    assert_eq!(h.snapshot.borrow().phase(), SessionPhase::Unregistered);

    time::sleep(Duration::from_secs(10)).await;
    assert!(h.peer.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_server_disconnect_for_other_session_keeps_keepalive() {
    let mut h = start(true);
    h.register(5).await;

    h.deliver(Message::DisconnectClient {
        session_id: SessionId(6),
    });
    time::sleep(Duration::from_millis(2_100)).await;

    assert_eq!(h.snapshot.borrow().phase(), SessionPhase::Registered(SessionId(5)));
    assert_eq!(
        h.next_message().await,
        Message::Ping {
            session_id: SessionId(5)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_register_after_kick_is_accepted() {
    let mut h = start(true);
    h.register(5).await;
    h.deliver(Message::KickClient {
        status: 0,
        reason: String::new(),
    });
    h.wait_event(|e| matches!(e, ClientEvent::Kicked { .. })).await;

    h.command("register").await;
    h.register(6).await;
    assert_eq!(h.snapshot.borrow().session_id(), Some(SessionId(6)));
}

// =========================================================================
// Commands gated on registration
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_create_room_while_unregistered_is_rejected_without_datagram() {
    let mut h = start(false);

    h.command("create 4 lobby").await;
    let event = h.wait_event(|e| matches!(e, ClientEvent::Rejected(_))).await;
    assert_eq!(
        event,
        ClientEvent::Rejected(CommandError::Session(SessionError::NotRegistered))
    );

    time::sleep(Duration::from_secs(1)).await;
    assert!(h.peer.try_next_frame().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rooms_command_works_while_unregistered() {
    let mut h = start(false);
    h.command("rooms").await;
    let event = h.wait_event(|e| matches!(e, ClientEvent::RoomList(_))).await;
    assert_eq!(event, ClientEvent::RoomList(vec![]));
}

#[tokio::test(start_paused = true)]
async fn test_create_room_while_registered_sends_request() {
    let mut h = start(true);
    h.register(5).await;

    h.command("create 4 lobby pw").await;
    assert_eq!(
        h.next_message().await,
        Message::CreateRoom {
            session_id: SessionId(5),
            max_players: 4,
            name: "lobby".into(),
            password: "pw".into(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_sends_list_rooms() {
    let mut h = start(true);
    h.register(5).await;

    h.command("refresh").await;
    assert_eq!(
        h.next_message().await,
        Message::ListRooms {
            session_id: SessionId(5)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_say_sends_chat_with_own_id() {
    let mut h = start(true);
    h.register(5).await;

    h.command("say good game").await;
    assert_eq!(
        h.next_message().await,
        Message::Chat {
            peer_id: PeerId(5),
            text: "good game".into(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_command_is_rejected() {
    let mut h = start(false);
    h.command("join nowhere").await;
    let event = h.wait_event(|e| matches!(e, ClientEvent::Rejected(_))).await;
    assert!(matches!(
        event,
        ClientEvent::Rejected(CommandError::InvalidArgument { .. })
    ));
}

// =========================================================================
// Rooms, peers and chat
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_room_announce_twice_keeps_latest_entry() {
    let mut h = start(false);

    for joined in [1, 2] {
        h.deliver(Message::RoomAnnounce {
            room_id: RoomId(3),
            max_players: 4,
            joined_players: joined,
            password_protected: false,
            name: "Alpha".into(),
        });
        h.wait_event(|e| matches!(e, ClientEvent::RoomAnnounced(_))).await;
    }

    h.command("rooms").await;
    let event = h.wait_event(|e| matches!(e, ClientEvent::RoomList(_))).await;
    assert_eq!(
        event,
        ClientEvent::RoomList(vec![RoomSummary {
            room_id: RoomId(3),
            max_players: 4,
            joined_players: 2,
            password_protected: false,
            name: "Alpha".into(),
        }])
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_room_sets_current_room_on_success() {
    let mut h = start(true);
    h.register(5).await;

    h.command("join 3").await;
    assert_eq!(
        h.next_message().await,
        Message::JoinRoom {
            session_id: SessionId(5),
            room_id: RoomId(3),
            password: String::new(),
        }
    );

    h.deliver(Message::Status {
        code: StatusCode::RoomSuccess,
    });
    let event = h.wait_event(|e| matches!(e, ClientEvent::JoinedRoom(_))).await;
    assert_eq!(event, ClientEvent::JoinedRoom(RoomId(3)));
    assert_eq!(h.snapshot.borrow().current_room(), Some(RoomId(3)));
}

#[tokio::test(start_paused = true)]
async fn test_chat_from_unknown_peer_is_delivered_unnamed() {
    let mut h = start(false);
    h.deliver(Message::Chat {
        peer_id: PeerId(42),
        text: "hello?".into(),
    });
    let event = h.wait_event(|e| matches!(e, ClientEvent::Chat { .. })).await;
    assert_eq!(event.to_string(), "<unknown #42> hello?");
}

#[tokio::test(start_paused = true)]
async fn test_chat_from_announced_peer_uses_name() {
    let mut h = start(false);
    h.deliver(Message::PeerAnnounce {
        peer_id: PeerId(2),
        status: PeerStatus::Joined,
        name: "Eve".into(),
    });
    h.deliver(Message::Chat {
        peer_id: PeerId(2),
        text: "gl hf".into(),
    });
    let event = h.wait_event(|e| matches!(e, ClientEvent::Chat { .. })).await;
    assert_eq!(event.to_string(), "<Eve> gl hf");
}

#[tokio::test(start_paused = true)]
async fn test_status_and_match_starting_are_surfaced() {
    let mut h = start(false);
    h.deliver(Message::Status {
        code: StatusCode::BadPassword,
    });
    let event = h.wait_event(|e| matches!(e, ClientEvent::Status(_))).await;
    assert_eq!(event.to_string(), "server: bad password (7)");

    h.deliver(Message::Status {
        code: StatusCode::MatchStarting,
    });
    h.wait_event(|e| matches!(e, ClientEvent::MatchStarting)).await;
}

#[tokio::test(start_paused = true)]
async fn test_gameplay_updates_are_surfaced() {
    let mut h = start(false);
    h.deliver(Message::UpdateClientState {
        lines: 4,
        score: 800,
        level: 2,
        status: 0,
        changed_lines: vec![19, 18],
    });
    let event = h
        .wait_event(|e| matches!(e, ClientEvent::ClientStateUpdated { .. }))
        .await;
    assert_eq!(
        event,
        ClientEvent::ClientStateUpdated {
            lines: 4,
            score: 800,
            level: 2,
            status: 0,
            changed_lines: vec![19, 18],
        }
    );
}

// =========================================================================
// Bad input from the network
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_undecodable_datagrams_are_dropped() {
    let mut h = start(false);

    // Truncated update-client-state, legacy kind 10, empty datagram.
    assert!(h.peer.deliver(vec![0x01, 0x03, 0x00]));
    assert!(h.peer.deliver(vec![0x01, 0x0A]));
    assert!(h.peer.deliver(Vec::new()));
    h.deliver(Message::Status {
        code: StatusCode::Success,
    });

    // The first event is the status; nothing came of the bad datagrams.
    let event = time::timeout(WAIT, h.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ClientEvent::Status(StatusCode::Success));
    assert_eq!(h.snapshot.borrow().phase(), SessionPhase::Unregistered);
}

#[tokio::test(start_paused = true)]
async fn test_foreign_protocol_version_is_dropped() {
    let mut h = start(false);

    let mut foreign = Envelope::new(Message::RegistrationAck {
        session_id: SessionId(8),
    });
    foreign.version = 2;
    assert!(h.peer.deliver(encode(&foreign).unwrap().to_vec()));
    h.deliver(Message::Status {
        code: StatusCode::Success,
    });

    let event = time::timeout(WAIT, h.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ClientEvent::Status(StatusCode::Success));
    assert!(!h.snapshot.borrow().registered());
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_quit_while_registered_sends_one_disconnect_before_close() {
    let mut h = start(true);
    h.register(9).await;

    h.command("quit").await;
    let (result, frames) = h.finish().await;

    assert!(result.is_ok());
    let disconnects = frames.iter().filter(|f| **f == disconnect(9)).count();
    assert_eq!(disconnects, 1);
    assert_eq!(frames.last(), Some(&MemoryFrame::Closed));
    assert_eq!(frames[frames.len() - 2], disconnect(9));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_unregistered_sends_no_disconnect() {
    let h = start(false);
    h.shutdown.cancel();
    let (result, frames) = h.finish().await;

    assert!(result.is_ok());
    assert_eq!(frames, vec![MemoryFrame::Closed]);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_input_shuts_down() {
    let mut h = start(true);
    h.register(3).await;

    let (lines, _) = mpsc::channel(1);
    drop(std::mem::replace(&mut h.lines, lines));

    let event = h
        .wait_event(|e| matches!(e, ClientEvent::ShuttingDown { .. }))
        .await;
    assert_eq!(
        event,
        ClientEvent::ShuttingDown {
            farewell: Some(SessionId(3))
        }
    );
    let (result, frames) = h.finish().await;
    assert!(result.is_ok());
    assert_eq!(frames.last(), Some(&MemoryFrame::Closed));
    assert!(frames.contains(&disconnect(3)));
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_fatal() {
    let (transport, peer) = pair();
    let client = ClientBuilder::new("Bob")
        .poll_interval(Duration::from_millis(20))
        .build(transport);
    let (_lines, lines_rx) = mpsc::channel(1);
    let (events_tx, _events) = mpsc::unbounded_channel();

    drop(peer);
    let result = time::timeout(WAIT, client.run(lines_rx, events_tx))
        .await
        .expect("client should stop in time");

    assert!(matches!(result, Err(NtetrisError::Transport(_))));
}
