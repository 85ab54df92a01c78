//! Client-side session state for ntetris.
//!
//! This crate is the client's memory of the conversation with the server:
//!
//! 1. **Phase**: whether this client is registered, and under which
//!    session id ([`SessionPhase`])
//! 2. **Directories**: rooms and peers the server has announced
//!    ([`RoomDirectory`], [`PeerDirectory`])
//! 3. **Transitions**: a pure state machine that applies one decoded
//!    message at a time and reports what changed ([`SessionState::apply`],
//!    [`Transition`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Runtime (above)  ← dispatcher owns the one SessionState, turns Transitions into effects
//!     ↕
//! Session Layer (this crate)  ← phase, current room, known rooms and peers
//!     ↕
//! Protocol Layer (below)  ← provides Message, SessionId, RoomId, PeerId
//! ```
//!
//! Nothing in here does I/O or spawns tasks; the runtime decides what to
//! send and when.

mod directory;
mod error;
mod state;

pub use directory::{PeerDirectory, PeerSummary, RoomDirectory, RoomSummary};
pub use error::SessionError;
pub use state::{SessionPhase, SessionState, Transition};
