//! UDP transport implementation using `tokio::net::UdpSocket`.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::{UdpSocket, lookup_host};
use tokio::sync::Mutex;

use crate::{Transport, TransportError};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

/// A [`Transport`] over a connected UDP socket.
///
/// "Connected" in the UDP sense: the socket only exchanges datagrams with
/// one remote address, and datagrams from anywhere else are filtered out
/// by the kernel.
///
/// # Refused datagrams
///
/// `ConnectionRefused` is the one socket error this transport tolerates.
/// On a connected UDP socket it only reports an ICMP "port unreachable"
/// for an earlier datagram (typically the server isn't up yet), so `send`
/// and `recv` log it and carry on. Every other socket error is returned
/// and is fatal to the runtime.
pub struct UdpTransport {
    socket: UdpSocket,
    remote: SocketAddr,
    /// Reused for every receive; only the received bytes are copied out.
    recv_buf: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl UdpTransport {
    /// Resolves `host:port`, binds an ephemeral local port of the same
    /// address family and connects the socket to the remote.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let remote = lookup_host((host, port))
            .await
            .map_err(|e| TransportError::Resolve(format!("{host}:{port} ({e})")))?
            .next()
            .ok_or_else(|| TransportError::Resolve(format!("{host}:{port}")))?;

        let local: SocketAddr = if remote.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(TransportError::BindFailed)?;

        Self::from_socket(socket, remote).await
    }

    /// Wraps an already bound socket and connects it to `remote`.
    pub async fn from_socket(
        socket: UdpSocket,
        remote: SocketAddr,
    ) -> Result<Self, TransportError> {
        socket
            .connect(remote)
            .await
            .map_err(TransportError::BindFailed)?;

        tracing::info!(%remote, local = ?socket.local_addr().ok(), "UDP transport ready");
        Ok(Self {
            socket,
            remote,
            recv_buf: Mutex::new(vec![0u8; MAX_DATAGRAM]),
            closed: AtomicBool::new(false),
        })
    }

    /// The local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::BindFailed)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Shutdown)
        } else {
            Ok(())
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        match self.socket.send(datagram).await {
            Ok(_) => Ok(()),
            // An ICMP "port unreachable" from an earlier datagram surfaces
            // on the next call. The datagram is simply lost.
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                tracing::warn!(remote = %self.remote, "remote refused datagram");
                Ok(())
            }
            Err(e) => Err(TransportError::SendFailed(e)),
        }
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut buf = self.recv_buf.lock().await;
        loop {
            self.ensure_open()?;
            match self.socket.recv(&mut buf[..]).await {
                Ok(n) => return Ok(buf[..n].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    tracing::debug!(remote = %self.remote, "remote unreachable, still listening");
                }
                Err(e) => return Err(TransportError::ReceiveFailed(e)),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(remote = %self.remote, "UDP transport closed");
        }
        Ok(())
    }
}
