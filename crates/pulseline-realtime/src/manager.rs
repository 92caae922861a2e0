//! Connection manager
//!
//! Owns the stream lifecycle: open/close/retry, visibility-driven
//! suspension, and the connection/retry state everything else only observes.
//! The manager is an actor task; `ConnectionManager` is the cheap cloneable
//! handle the application holds.
//!
//! State machine:
//! - `Disconnected --connect()--> Connecting`
//! - `Connecting --opened--> Connected` (resets the retry schedule)
//! - `Connecting/Connected --failure--> Reconnecting`, or `Disconnected`
//!   once the attempt budget is exhausted
//! - any state `--disconnect()--> Disconnected` (intentional, suppresses
//!   auto-retry)
//! - `Connecting/Connected/Reconnecting --hidden past grace--> Suspended`
//! - `Suspended --foregrounded--> Connecting` (attempts reset)
//!
//! In-flight opens carry a generation counter; a result arriving after a
//! `disconnect()` or suspension is stale and gets dropped, so two attempts
//! can never race into a double-open stream.

use std::sync::Arc;

use futures::stream;
use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use pulseline_core::connection::{ConnectionState, RetryState, StreamRole};
use pulseline_core::signal::Signal;
use pulseline_core::traits::{FrameStream, StreamTransport};
use pulseline_core::Result;

use crate::config::ManagerConfig;
use crate::dispatcher::EventDispatcher;
use crate::visibility::{ResumeAction, Visibility, VisibilityPolicy};

/// Lifecycle notifications observable alongside the state signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerEvent {
    /// The stream (re)opened; callers reconcile to cover any gap
    Restored,
    /// The attempt budget is exhausted; only an explicit `connect()` resumes
    GaveUp,
}

enum Command {
    Connect(StreamRole),
    Disconnect,
    SetVisibility(Visibility),
}

/// Handle to the connection manager actor
///
/// All methods are fire-and-forget: completion is observable through the
/// state signal and the event subscription, never synchronously.
#[derive(Clone)]
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: Signal<ConnectionState>,
    exhausted: Signal<bool>,
    events_tx: broadcast::Sender<ManagerEvent>,
}

impl ConnectionManager {
    /// Spawn the manager actor
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        dispatcher: Arc<EventDispatcher>,
        config: ManagerConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = Signal::new(ConnectionState::Disconnected);
        let exhausted = Signal::new(false);
        let (events_tx, _) = broadcast::channel(16);

        let actor = ConnectionActor {
            visibility: VisibilityPolicy::new(config.hidden_grace),
            config,
            transport,
            dispatcher,
            state: state.clone(),
            exhausted: exhausted.clone(),
            events_tx: events_tx.clone(),
            retry: RetryState::new(),
            intentional: false,
            role: None,
            attempt_gen: 0,
            retry_deadline: None,
            grace_deadline: None,
        };
        tokio::spawn(actor.run(cmd_rx));

        Self {
            cmd_tx,
            state,
            exhausted,
            events_tx,
        }
    }

    /// Open the stream for `role`
    ///
    /// Idempotent: a no-op while already connecting or connected. While
    /// reconnecting it acts as a manual reconnect - the pending timer is
    /// cancelled and the attempt count reset.
    pub fn connect(&self, role: StreamRole) {
        let _ = self.cmd_tx.send(Command::Connect(role));
    }

    /// Close the stream intentionally, suppressing auto-retry and
    /// visibility-driven resumption. Idempotent.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Feed the host environment's foreground/background signal
    pub fn set_visibility(&self, visibility: Visibility) {
        let _ = self.cmd_tx.send(Command::SetVisibility(visibility));
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Subscribe to connection state changes
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// True while the stream is open
    pub fn is_connected(&self) -> bool {
        self.state.get().is_connected()
    }

    /// True while an attempt is in flight or scheduled
    pub fn is_connecting(&self) -> bool {
        self.state.get().is_connecting()
    }

    /// True once the attempt budget was exhausted; cleared by `connect()`
    pub fn retry_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    /// Subscribe to lifecycle events (`Restored`, `GaveUp`)
    pub fn subscribe(&self) -> broadcast::Receiver<ManagerEvent> {
        self.events_tx.subscribe()
    }
}

struct ConnectionActor {
    config: ManagerConfig,
    transport: Arc<dyn StreamTransport>,
    dispatcher: Arc<EventDispatcher>,
    state: Signal<ConnectionState>,
    exhausted: Signal<bool>,
    events_tx: broadcast::Sender<ManagerEvent>,
    retry: RetryState,
    visibility: VisibilityPolicy,
    intentional: bool,
    role: Option<StreamRole>,
    attempt_gen: u64,
    retry_deadline: Option<Instant>,
    grace_deadline: Option<Instant>,
}

/// Sleep until the deadline, or forever when there is none
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl ConnectionActor {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let (opened_tx, mut opened_rx) = mpsc::unbounded_channel::<(u64, Result<FrameStream>)>();
        // A pending stream stands in for "no connection"; it never yields.
        let mut frames: FrameStream = Box::pin(stream::pending());

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &opened_tx, &mut frames),
                    // Every handle is gone; tear the session down.
                    None => break,
                },
                Some((gen, result)) = opened_rx.recv() => {
                    self.handle_opened(gen, result, &mut frames);
                }
                frame = frames.next() => match frame {
                    Some(Ok(frame)) => self.dispatcher.dispatch(frame).await,
                    Some(Err(err)) => {
                        warn!(error = %err, "event stream failed");
                        frames = Box::pin(stream::pending());
                        self.handle_stream_failure();
                    }
                    None => {
                        debug!("event stream closed by server");
                        frames = Box::pin(stream::pending());
                        self.handle_stream_failure();
                    }
                },
                _ = deadline(self.retry_deadline) => self.on_retry_due(&opened_tx),
                _ = deadline(self.grace_deadline) => self.on_grace_expired(&mut frames),
            }
        }
    }

    fn handle_command(
        &mut self,
        cmd: Command,
        opened_tx: &mpsc::UnboundedSender<(u64, Result<FrameStream>)>,
        frames: &mut FrameStream,
    ) {
        match cmd {
            Command::Connect(role) => {
                self.intentional = false;
                self.exhausted.set(false);
                self.role = Some(role);
                match self.state.get() {
                    ConnectionState::Connecting | ConnectionState::Connected => {
                        debug!("connect() while already active; ignoring");
                    }
                    _ => {
                        // A caller-initiated connect resets the schedule.
                        self.retry.reset();
                        self.retry_deadline = None;
                        if self.visibility.is_hidden() {
                            debug!("connect() while hidden; deferring until foreground");
                            self.visibility.defer_retry();
                            self.state.set(ConnectionState::Reconnecting);
                        } else {
                            self.start_attempt(opened_tx);
                        }
                    }
                }
            }
            Command::Disconnect => {
                self.intentional = true;
                self.attempt_gen += 1;
                *frames = Box::pin(stream::pending());
                self.retry_deadline = None;
                self.grace_deadline = None;
                self.retry.reset();
                self.visibility.reset();
                self.state.set(ConnectionState::Disconnected);
                info!("event stream disconnected intentionally");
            }
            Command::SetVisibility(Visibility::Hidden) => {
                let active = self.state.get().is_active();
                if let Some(grace) = self.visibility.on_hidden(active) {
                    debug!(grace_ms = grace.as_millis() as u64, "backgrounded; arming grace timer");
                    self.grace_deadline = Some(Instant::now() + grace);
                }
            }
            Command::SetVisibility(Visibility::Visible) => {
                self.grace_deadline = None;
                match self.visibility.on_visible() {
                    ResumeAction::Reconnect => {
                        if !self.intentional {
                            info!("foregrounded; resuming suspended stream");
                            self.retry.reset();
                            self.start_attempt(opened_tx);
                        }
                    }
                    ResumeAction::RetryNow => {
                        debug!("foregrounded; running deferred reconnect");
                        self.start_attempt(opened_tx);
                    }
                    ResumeAction::None => {}
                }
            }
        }
    }

    fn start_attempt(&mut self, opened_tx: &mpsc::UnboundedSender<(u64, Result<FrameStream>)>) {
        let Some(role) = self.role else {
            warn!("connection attempt without a role; ignoring");
            return;
        };
        self.retry_deadline = None;
        self.state.set(ConnectionState::Connecting);
        self.attempt_gen += 1;
        let gen = self.attempt_gen;
        let transport = Arc::clone(&self.transport);
        let opened_tx = opened_tx.clone();
        tokio::spawn(async move {
            let result = transport.open(role).await;
            let _ = opened_tx.send((gen, result));
        });
    }

    fn handle_opened(&mut self, gen: u64, result: Result<FrameStream>, frames: &mut FrameStream) {
        if gen != self.attempt_gen {
            // The session moved on (disconnect/suspend) while this attempt
            // was in flight; dropping the stream closes it.
            debug!("dropping stale connection attempt");
            return;
        }
        match result {
            Ok(stream) => {
                *frames = stream;
                self.retry.reset();
                self.state.set(ConnectionState::Connected);
                let _ = self.events_tx.send(ManagerEvent::Restored);
                info!("event stream connected");
            }
            Err(err) => {
                warn!(error = %err, "connection attempt failed");
                self.handle_stream_failure();
            }
        }
    }

    fn handle_stream_failure(&mut self) {
        self.attempt_gen += 1;
        if self.intentional {
            self.state.set(ConnectionState::Disconnected);
            return;
        }

        let delay = self.config.reconnect.delay_for_attempt(self.retry.attempt_count);
        self.retry.record_failure(delay);

        if !self.config.reconnect.has_attempts_remaining(self.retry.attempt_count) {
            warn!(
                attempts = self.retry.attempt_count,
                "reconnect attempts exhausted; giving up until an explicit connect"
            );
            self.retry_deadline = None;
            self.exhausted.set(true);
            self.state.set(ConnectionState::Disconnected);
            let _ = self.events_tx.send(ManagerEvent::GaveUp);
            return;
        }

        debug!(
            attempt = self.retry.attempt_count,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.state.set(ConnectionState::Reconnecting);
        self.retry_deadline = Some(Instant::now() + delay);
    }

    fn on_retry_due(&mut self, opened_tx: &mpsc::UnboundedSender<(u64, Result<FrameStream>)>) {
        self.retry_deadline = None;
        if self.visibility.is_hidden() {
            debug!("reconnect due while hidden; deferring until foreground");
            self.visibility.defer_retry();
            return;
        }
        self.start_attempt(opened_tx);
    }

    fn on_grace_expired(&mut self, frames: &mut FrameStream) {
        self.grace_deadline = None;
        if !self.state.get().is_active() {
            return;
        }
        info!("backgrounded past grace; suspending event stream");
        self.attempt_gen += 1;
        *frames = Box::pin(stream::pending());
        self.retry_deadline = None;
        self.visibility.note_suspended();
        self.state.set(ConnectionState::Suspended);
    }
}
