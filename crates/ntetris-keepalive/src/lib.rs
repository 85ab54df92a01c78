//! Keepalive scheduler for the ntetris client.
//!
//! While a session is registered, the server expects a ping every couple
//! of seconds as proof of life. [`KeepaliveScheduler`] runs one periodic
//! task per registered session that pushes an encoded ping onto the
//! outbound queue.
//!
//! # Stale timers
//!
//! The stream is keyed to a [`SessionId`]. Every tick takes the
//! scheduler's lock and re-checks that its session is still the active
//! one before enqueueing, and [`KeepaliveScheduler::stop`] clears the
//! active session under that same lock. Once `stop()` returns no tick can
//! enqueue again, even if it was already past its sleep when `stop()` was
//! called.
//!
//! # Integration
//!
//! The scheduler is owned by the runtime's dispatcher, which starts it on
//! a registration-ack and stops it on a kick or on shutdown:
//!
//! ```ignore
//! match state.apply(message) {
//!     Transition::Registered { session_id, .. } => keepalive.start(session_id).await?,
//!     Transition::Kicked { .. } => keepalive.stop().await,
//!     _ => {}
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ntetris_protocol::{EncodeError, Envelope, Message, SessionId, encode};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the keepalive stream.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Time between pings. Default: 2 seconds.
    pub period: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(2),
        }
    }
}

impl KeepaliveConfig {
    /// Shortest period accepted. Anything below is clamped up to this.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    pub fn with_period(period: Duration) -> Self {
        Self { period }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`KeepaliveScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "keepalive period too short, clamping"
            );
            self.period = Self::MIN_PERIOD;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Periodically enqueues a ping for the active session.
///
/// At most one stream runs at a time. Dropping the scheduler aborts it.
pub struct KeepaliveScheduler {
    config: KeepaliveConfig,
    outbound: mpsc::Sender<Bytes>,
    /// The session the running stream belongs to. Shared with the task.
    active: Arc<Mutex<Option<SessionId>>>,
    task: Option<JoinHandle<()>>,
    streams_started: u64,
}

impl KeepaliveScheduler {
    /// Creates an idle scheduler that will enqueue onto `outbound`.
    pub fn new(config: KeepaliveConfig, outbound: mpsc::Sender<Bytes>) -> Self {
        let config = config.validated();
        debug!(period_ms = config.period.as_millis() as u64, "keepalive scheduler created");
        Self {
            config,
            outbound,
            active: Arc::new(Mutex::new(None)),
            task: None,
            streams_started: 0,
        }
    }

    /// Starts the stream for `session_id`. The first ping is enqueued
    /// right away.
    ///
    /// Returns `Ok(false)` without doing anything if that session's stream
    /// is already running. A stream for a different session is stopped
    /// first.
    pub async fn start(&mut self, session_id: SessionId) -> Result<bool, EncodeError> {
        let ping = encode(&Envelope::new(Message::Ping { session_id }))?;

        let mut active = self.active.lock().await;
        let running = self.task.as_ref().is_some_and(|t| !t.is_finished());
        if running && *active == Some(session_id) {
            trace!(%session_id, "keepalive already running");
            return Ok(false);
        }

        if let Some(old) = self.task.take() {
            old.abort();
            if let Some(previous) = *active {
                debug!(%previous, %session_id, "keepalive switching session");
            }
        }
        *active = Some(session_id);
        drop(active);

        self.task = Some(tokio::spawn(ping_loop(
            session_id,
            self.config.period,
            ping,
            self.outbound.clone(),
            Arc::clone(&self.active),
        )));
        self.streams_started += 1;
        info!(%session_id, period_ms = self.config.period.as_millis() as u64, "keepalive started");
        Ok(true)
    }

    /// Stops the stream. No ping is enqueued after this returns.
    ///
    /// Safe to call when nothing is running.
    pub async fn stop(&mut self) {
        let mut active = self.active.lock().await;
        let previous = active.take();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        drop(active);

        if let Some(session_id) = previous {
            info!(%session_id, "keepalive stopped");
        }
    }

    /// The session whose stream is running, if any.
    pub async fn active_session(&self) -> Option<SessionId> {
        *self.active.lock().await
    }

    /// Whether a stream task is currently alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// How many streams have been started over the scheduler's lifetime.
    pub fn streams_started(&self) -> u64 {
        self.streams_started
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }
}

impl Drop for KeepaliveScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Body of one keepalive stream.
async fn ping_loop(
    session_id: SessionId,
    period: Duration,
    ping: Bytes,
    outbound: mpsc::Sender<Bytes>,
    active: Arc<Mutex<Option<SessionId>>>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // Held across the enqueue so stop() can't interleave with it.
        let guard = active.lock().await;
        if *guard != Some(session_id) {
            debug!(%session_id, "keepalive tick for stale session, exiting");
            return;
        }

        match outbound.try_send(ping.clone()) {
            Ok(()) => trace!(%session_id, "ping enqueued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%session_id, "outbound queue full, dropping ping");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%session_id, "outbound queue closed, keepalive exiting");
                return;
            }
        }
        drop(guard);
    }
}
