//! Client configuration and the builder that produces a [`Client`].

use std::time::Duration;

use ntetris_keepalive::KeepaliveConfig;
use ntetris_transport::{Transport, UdpTransport};
use tracing::warn;

use crate::{Client, NtetrisError};

/// Runtime settings for one client.
///
/// Nothing here is read from the environment or from files; the binary
/// builds it from its command line and everything else takes defaults.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name sent with register-client.
    pub display_name: String,
    /// Keepalive period while registered.
    pub keepalive: KeepaliveConfig,
    /// Bounded wait used by both pumps. Also how quickly they notice
    /// shutdown. Default: 250 ms.
    pub poll_interval: Duration,
    /// Minimum gap between two outbound datagrams. Default: 10 ms.
    pub send_spacing: Duration,
    /// Capacity of the inbound, outbound and control channels.
    /// Default: 64.
    pub channel_capacity: usize,
    /// Send register-client as soon as the runtime starts. Default: true.
    pub register_on_start: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            keepalive: KeepaliveConfig::default(),
            poll_interval: Duration::from_millis(250),
            send_spacing: Duration::from_millis(10),
            channel_capacity: 64,
            register_on_start: true,
        }
    }
}

impl ClientConfig {
    pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically when a [`Client`] is created.
    pub fn validated(mut self) -> Self {
        if self.poll_interval < Self::MIN_POLL_INTERVAL {
            warn!(
                poll_ms = self.poll_interval.as_millis() as u64,
                "poll_interval too short, clamping"
            );
            self.poll_interval = Self::MIN_POLL_INTERVAL;
        }
        if self.channel_capacity == 0 {
            warn!("channel_capacity is 0, using 1");
            self.channel_capacity = 1;
        }
        self.keepalive = self.keepalive.validated();
        self
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and creating a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use ntetris::prelude::*;
///
/// # async fn run() -> Result<(), NtetrisError> {
/// let client = Client::builder("Bob")
///     .keepalive_period(std::time::Duration::from_secs(2))
///     .connect("127.0.0.1", 7777)
///     .await?;
/// # let _ = client;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a builder with default settings for `display_name`.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                display_name: display_name.into(),
                ..ClientConfig::default()
            },
        }
    }

    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.config.keepalive = keepalive;
        self
    }

    pub fn keepalive_period(mut self, period: Duration) -> Self {
        self.config.keepalive.period = period;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn send_spacing(mut self, spacing: Duration) -> Self {
        self.config.send_spacing = spacing;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Whether to register automatically on start. Turn it off to drive
    /// registration with the `register` command instead.
    pub fn register_on_start(mut self, register: bool) -> Self {
        self.config.register_on_start = register;
        self
    }

    /// The configuration as it stands, before validation.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Builds a client over an already prepared transport.
    pub fn build<T: Transport>(self, transport: T) -> Client<T> {
        Client::new(transport, self.config)
    }

    /// Opens a UDP transport to `host:port` and builds a client over it.
    pub async fn connect(
        self,
        host: &str,
        port: u16,
    ) -> Result<Client<UdpTransport>, NtetrisError> {
        let transport = UdpTransport::connect(host, port).await?;
        Ok(self.build(transport))
    }
}
