//! The two actors that touch the transport.
//!
//! The inbound pump is the only reader and the outbound pump the only
//! writer. Both wait with a bounded timeout so they notice shutdown within
//! one poll interval even when there is no traffic.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ntetris_protocol::{Envelope, Message, encode};
use ntetris_session::SessionState;
use ntetris_transport::{Transport, TransportError};
use tokio::sync::{mpsc, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Reads datagrams and hands them to the dispatcher untouched.
///
/// A receive error is fatal unless shutdown is already under way (the
/// outbound pump closes the transport as its last act).
pub(crate) async fn inbound<T: Transport>(
    transport: Arc<T>,
    inbound: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
    poll_interval: Duration,
) -> Result<(), TransportError> {
    debug!("inbound pump started");

    while !shutdown.is_cancelled() {
        let datagram = match time::timeout(poll_interval, transport.recv()).await {
            Err(_) => continue,
            Ok(Ok(datagram)) => datagram,
            Ok(Err(_)) if shutdown.is_cancelled() => break,
            Ok(Err(err)) => {
                error!(error = %err, "transport receive failed");
                shutdown.cancel();
                return Err(err);
            }
        };

        trace!(len = datagram.len(), "datagram received");
        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = inbound.send(datagram) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!("inbound pump stopped");
    Ok(())
}

/// Writes queued datagrams, then says goodbye and closes the transport.
///
/// After shutdown is observed, queued datagrams are discarded. If the
/// last published session has a farewell id, exactly one disconnect is
/// written, and only then is the transport closed.
pub(crate) async fn outbound<T: Transport>(
    transport: Arc<T>,
    mut outbound: mpsc::Receiver<Bytes>,
    snapshot: watch::Receiver<SessionState>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    send_spacing: Duration,
) -> Result<(), TransportError> {
    debug!("outbound pump started");

    let result = loop {
        if shutdown.is_cancelled() {
            break Ok(());
        }
        let datagram = match time::timeout(poll_interval, outbound.recv()).await {
            Err(_) => continue,
            Ok(Some(datagram)) => datagram,
            Ok(None) => break Ok(()),
        };

        if let Err(err) = transport.send(&datagram).await {
            error!(error = %err, "transport send failed");
            shutdown.cancel();
            break Err(err);
        }
        trace!(len = datagram.len(), "datagram sent");

        if !send_spacing.is_zero() {
            time::sleep(send_spacing).await;
        }
    };

    if result.is_ok() {
        farewell(transport.as_ref(), &snapshot).await;
    }
    transport.close().await?;
    debug!("outbound pump stopped");
    result
}

async fn farewell<T: Transport>(transport: &T, snapshot: &watch::Receiver<SessionState>) {
    let session = snapshot.borrow().farewell_session();
    let Some(session_id) = session else {
        return;
    };

    let bytes = match encode(&Envelope::new(Message::DisconnectClient { session_id })) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "could not encode disconnect");
            return;
        }
    };
    match transport.send(&bytes).await {
        Ok(()) => info!(%session_id, "disconnect sent"),
        Err(err) => warn!(%session_id, error = %err, "disconnect not sent"),
    }
}
