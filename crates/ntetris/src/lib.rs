//! # ntetris
//!
//! Client runtime for the ntetris multiplayer tetris service.
//!
//! The client talks to the server over UDP with a small binary protocol:
//! it registers under a display name, keeps its session alive with
//! periodic pings, discovers, creates and joins rooms, chats with other
//! players, and relays gameplay updates. This crate ties the layers
//! together into a set of cooperating actors:
//!
//! - **Inbound / outbound pumps** move datagrams between the transport and
//!   two bounded channels.
//! - **Dispatcher** decodes inbound datagrams and is the only task that
//!   mutates the session state.
//! - **Keepalive scheduler** pings while registered.
//! - **Command interpreter** turns user lines into protocol messages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ntetris::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), NtetrisError> {
//! let client = Client::builder("Bob").connect("127.0.0.1", 7777).await?;
//!
//! let (lines_tx, lines) = mpsc::channel(16);
//! let (events, mut events_rx) = mpsc::unbounded_channel();
//! tokio::spawn(async move {
//!     while let Some(event) = events_rx.recv().await {
//!         println!("{event}");
//!     }
//! });
//!
//! lines_tx.send("rooms".into()).await.ok();
//! client.run(lines, events).await
//! # }
//! ```

mod client;
mod command;
mod config;
mod dispatcher;
mod error;
mod event;
mod pump;

pub use client::Client;
pub use command::{Command, CommandError, HELP};
pub use config::{ClientBuilder, ClientConfig};
pub use error::NtetrisError;
pub use event::ClientEvent;

// Re-export sub-crates so users only need `ntetris` as a dependency.
pub use ntetris_keepalive as keepalive;
pub use ntetris_protocol as protocol;
pub use ntetris_session as session;
pub use ntetris_transport as transport;

/// Everything needed to run a client, in one import.
pub mod prelude {
    pub use crate::{
        Client, ClientBuilder, ClientConfig, ClientEvent, Command, CommandError, NtetrisError,
    };
    pub use ntetris_keepalive::KeepaliveConfig;
    pub use ntetris_protocol::{
        Envelope, Message, PeerId, PeerStatus, RoomId, SessionId, StatusCode, decode, encode,
    };
    pub use ntetris_session::{
        PeerSummary, RoomSummary, SessionError, SessionPhase, SessionState,
    };
    pub use ntetris_transport::{
        MemoryFrame, MemoryPeer, MemoryTransport, Transport, TransportError, UdpTransport,
    };
}
