/// Errors that can occur in the transport layer.
///
/// Every variant is fatal to the runtime: the pumps stop and the client
/// shuts down.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The other end of the transport went away.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a datagram failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a datagram failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or connecting the local socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// The remote host name didn't resolve to a usable address.
    #[error("could not resolve {0}")]
    Resolve(String),

    /// The transport was closed locally.
    #[error("transport shut down")]
    Shutdown,
}
