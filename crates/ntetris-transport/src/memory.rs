//! In-process transport for driving the runtime without a network.
//!
//! [`pair`] returns the client-facing [`MemoryTransport`] and the
//! server-facing [`MemoryPeer`]. The peer sees every datagram the client
//! sends, followed by a [`MemoryFrame::Closed`] marker when the client
//! closes its end, so tests can check what was written and in which order
//! relative to the close.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Transport, TransportError};

/// What the peer observes on its side of the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryFrame {
    Datagram(Vec<u8>),
    /// The client closed its transport. Always the last frame.
    Closed,
}

/// The client end of an in-memory pair.
pub struct MemoryTransport {
    inbox: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbox: mpsc::UnboundedSender<MemoryFrame>,
    closed: AtomicBool,
}

/// The fake-server end of an in-memory pair.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<MemoryFrame>,
}

/// Creates a connected transport/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (to_client, inbox) = mpsc::unbounded_channel();
    let (outbox, from_client) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            inbox: Mutex::new(inbox),
            outbox,
            closed: AtomicBool::new(false),
        },
        MemoryPeer {
            to_client,
            from_client,
        },
    )
}

impl Transport for MemoryTransport {
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.outbox
            .send(MemoryFrame::Datagram(datagram.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed("memory peer dropped".into()))
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| TransportError::ConnectionClosed("memory peer dropped".into()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // The peer may already be gone; nothing left to tell it then.
            let _ = self.outbox.send(MemoryFrame::Closed);
        }
        Ok(())
    }
}

impl MemoryPeer {
    /// Delivers a datagram to the client. Returns `false` if the client
    /// end has been dropped.
    pub fn deliver(&self, datagram: impl Into<Vec<u8>>) -> bool {
        self.to_client.send(datagram.into()).is_ok()
    }

    /// Waits for the next frame from the client. `None` once the client
    /// end is dropped and every frame has been read.
    pub async fn next_frame(&mut self) -> Option<MemoryFrame> {
        self.from_client.recv().await
    }

    /// Returns the next frame if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<MemoryFrame> {
        self.from_client.try_recv().ok()
    }

    /// Drains everything queued so far.
    pub fn drain(&mut self) -> Vec<MemoryFrame> {
        std::iter::from_fn(|| self.try_next_frame()).collect()
    }
}
