//! [`Client`]: wires the actors together and runs them to completion.

use std::future::Future;
use std::sync::Arc;

use ntetris_keepalive::KeepaliveScheduler;
use ntetris_session::SessionState;
use ntetris_transport::{Transport, UdpTransport};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::command::CommandInterpreter;
use crate::dispatcher::Dispatcher;
use crate::{ClientBuilder, ClientConfig, ClientEvent, NtetrisError, pump};

/// A client session runtime over one transport.
///
/// ```text
///               lines                      control
///   user ──→ CommandInterpreter ───────────────────→ Dispatcher ──→ events ──→ user
///                   │                                  ↑    │
///                   │ outbound                 inbound │    │ outbound (ack echo)
///                   ▼                                  │    ▼
///             OutboundPump ←── KeepaliveScheduler   InboundPump
///                   │                                  ↑
///                   └──────────→ Transport ────────────┘
/// ```
///
/// All actors share one [`CancellationToken`]. Any of them ending, for
/// whatever reason, cancels it, so a single failure brings the whole
/// runtime down in an orderly way.
pub struct Client<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    shutdown: CancellationToken,
    snapshot: watch::Sender<SessionState>,
}

impl Client<UdpTransport> {
    /// Creates a builder for a client registering as `display_name`.
    ///
    /// The builder can also wrap any other [`Transport`] through
    /// [`ClientBuilder::build`].
    pub fn builder(display_name: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(display_name)
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let (snapshot, _) = watch::channel(SessionState::new());
        Self {
            transport: Arc::new(transport),
            config: config.validated(),
            shutdown: CancellationToken::new(),
            snapshot,
        }
    }

    /// The token that stops the runtime. Cancelling it is how callers
    /// (a Ctrl-C handler, a test) ask for shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// A receiver for session snapshots, updated after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshot.subscribe()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs every actor until shutdown and joins them all.
    ///
    /// `lines` feeds the command interpreter; closing it counts as `quit`.
    /// Every [`ClientEvent`] goes to `events`. Returns the first fatal
    /// error any actor hit.
    pub async fn run(
        self,
        lines: mpsc::Receiver<String>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Result<(), NtetrisError> {
        let Self {
            transport,
            config,
            shutdown,
            snapshot,
        } = self;

        let (inbound_tx, inbound_rx) = mpsc::channel(config.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.channel_capacity);
        let (control_tx, control_rx) = mpsc::channel(config.channel_capacity);

        let interpreter = CommandInterpreter {
            display_name: config.display_name.clone(),
            register_on_start: config.register_on_start,
            lines,
            outbound: outbound_tx.clone(),
            control: control_tx,
            snapshot: snapshot.subscribe(),
            events: events.clone(),
            shutdown: shutdown.clone(),
        };
        let outbound_snapshot = snapshot.subscribe();
        let dispatcher = Dispatcher {
            state: SessionState::new(),
            keepalive: KeepaliveScheduler::new(config.keepalive.clone(), outbound_tx.clone()),
            inbound: inbound_rx,
            control: control_rx,
            outbound: outbound_tx,
            snapshot,
            events,
            shutdown: shutdown.clone(),
        };

        let poll_interval = config.poll_interval;
        let send_spacing = config.send_spacing;
        info!(name = %config.display_name, "client starting");

        let inbound = spawn_actor("inbound-pump", &shutdown, {
            let transport = Arc::clone(&transport);
            let shutdown = shutdown.clone();
            async move {
                pump::inbound(transport, inbound_tx, shutdown, poll_interval)
                    .await
                    .map_err(NtetrisError::from)
            }
        });
        let outbound = spawn_actor("outbound-pump", &shutdown, {
            let shutdown = shutdown.clone();
            async move {
                pump::outbound(
                    transport,
                    outbound_rx,
                    outbound_snapshot,
                    shutdown,
                    poll_interval,
                    send_spacing,
                )
                .await
                .map_err(NtetrisError::from)
            }
        });
        let dispatch = spawn_actor("dispatcher", &shutdown, dispatcher.run());
        let commands = spawn_actor("command-interpreter", &shutdown, interpreter.run());

        let (inbound, outbound, dispatch, commands) =
            tokio::join!(inbound, outbound, dispatch, commands);

        let mut first_error = None;
        for joined in [inbound, outbound, dispatch, commands] {
            if let Err(err) = joined.map_err(NtetrisError::Actor).and_then(|r| r) {
                first_error.get_or_insert(err);
            }
        }

        info!("client stopped");
        first_error.map_or(Ok(()), Err)
    }
}

/// Spawns one actor. When it ends (returns, fails or panics) the shared
/// token is cancelled.
fn spawn_actor<F>(
    name: &'static str,
    shutdown: &CancellationToken,
    actor: F,
) -> JoinHandle<Result<(), NtetrisError>>
where
    F: Future<Output = Result<(), NtetrisError>> + Send + 'static,
{
    let guard = shutdown.clone().drop_guard();
    tokio::spawn(async move {
        let _guard = guard;
        let result = actor.await;
        match &result {
            Ok(()) => debug!(actor = name, "actor finished"),
            Err(err) => error!(actor = name, error = %err, "actor failed"),
        }
        result
    })
}
