//! Transport abstraction layer for the ntetris client.
//!
//! Provides the [`Transport`] trait that the runtime's pumps talk to, plus
//! two implementations:
//!
//! - [`UdpTransport`]: a UDP socket bound to an ephemeral local port and
//!   connected to the server's `host:port`.
//! - [`MemoryTransport`]: an in-process pair used to drive the runtime in
//!   tests without touching the network.

mod error;
mod memory;
mod udp;

pub use error::TransportError;
pub use memory::{MemoryFrame, MemoryPeer, MemoryTransport, pair};
pub use udp::{MAX_DATAGRAM, UdpTransport};

use std::future::Future;

/// A bound datagram endpoint addressed to a single remote.
///
/// The runtime shares one transport between its inbound pump (the only
/// caller of [`recv`](Transport::recv)) and its outbound pump (the only
/// caller of [`send`](Transport::send) and [`close`](Transport::close)),
/// so all methods take `&self`.
///
/// The futures are required to be `Send` so the pumps can run on any
/// Tokio worker thread.
pub trait Transport: Send + Sync + 'static {
    /// Sends one datagram to the remote.
    fn send(
        &self,
        datagram: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next datagram from the remote.
    ///
    /// There is no timeout here; callers bound the wait themselves. The
    /// future must be cancel-safe so that dropping it on a timeout loses
    /// nothing.
    fn recv(&self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Releases the endpoint. Later sends and receives fail with
    /// [`TransportError::Shutdown`].
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
