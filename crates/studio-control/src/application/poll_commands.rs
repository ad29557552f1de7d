//! PollCommands use case: the presenter side of the channel.
//!
//! # Overview (for beginners)
//!
//! A presenter cannot be "called" by the controller; the only thing they
//! share is a key/value store.  So the presenter *polls*: every interval it
//! reads the command key and, if a command it has not seen before is there,
//! hands the action to a handler.
//!
//! A poller runs in one of two modes:
//!
//! - **Durable** (`ack_key` is set).  After running the handler the poller
//!   writes an [`Ack`] with the command id and then clears the command key,
//!   but only if the key still holds the command it just handled.  On its
//!   very first tick it *reconciles* with whatever a previous presenter left
//!   behind, so a restart never replays a command that was already applied.
//! - **Minimal** (`ack_key` is `None`).  The only memory is the in-process
//!   "last seen id".  Nothing is ever written, so a restarted presenter will
//!   re-deliver whatever command is still sitting in the store.
//!
//! # Delivery guarantees
//!
//! - A given command id reaches the handler at most once per poller.
//! - `last_seen_id` is recorded *before* the handler runs.  A handler that
//!   fails (panics) still counts as delivered; the command is acknowledged
//!   and cleared like any other.
//! - Ticks never overlap.  A tick that fires while the previous one is still
//!   waiting on storage is skipped ([`TickOutcome::Busy`]).
//! - Every storage failure is absorbed.  A failed read makes the tick look
//!   empty; a failed ack or clear is logged and the tick still completes.
//!
//! # Lifecycle
//!
//! ```text
//! CommandPoller::new  ──start()──▶  PollerHandle  ──stop() / drop──▶  stopped
//! ```
//!
//! `start` consumes the poller, so a poller can only ever be running once.
//! A tick already in flight when `stop` is called runs to completion, and
//! [`PollerHandle::shutdown`] waits for it: once `shutdown` returns, the
//! handler will not be called again and no further ack or clear is written.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use studio_control_core::{decode, encode, Ack, Action, ChannelOptions, Command, State};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::infrastructure::storage::{read_or_absent, write_best_effort, StorageAdapter};

/// Callback invoked once per delivered command.
///
/// Receives the action and the full command (for its id, timestamp and
/// source).  The handler is synchronous and should return quickly; a handler
/// that needs to do async work should forward the action over a channel.
pub type CommandHandler = Arc<dyn Fn(Action, &Command) + Send + Sync>;

/// What a single [`CommandPoller::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The poller has been stopped; storage was not touched.
    Stopped,
    /// The previous tick is still running; this one was skipped.
    Busy,
    /// No well-formed command in the store (absent, cleared, malformed, or
    /// the read failed).
    Empty,
    /// The stored command was already delivered by this poller.
    AlreadyDelivered,
    /// The handler was invoked with this command.
    Delivered(Command),
}

// ── Session state ─────────────────────────────────────────────────────────────

/// Per-poller memory that survives between ticks.
#[derive(Debug, Default)]
struct Session {
    last_seen_id: Option<String>,
    reconciled: bool,
}

/// Holds the busy flag for the duration of one tick.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── CommandPoller ─────────────────────────────────────────────────────────────

/// Reads the command key and delivers new commands to a handler.
pub struct CommandPoller {
    storage: Arc<dyn StorageAdapter>,
    options: ChannelOptions,
    handler: CommandHandler,
    session: Mutex<Session>,
    busy: AtomicBool,
    stopped: AtomicBool,
    skipped: AtomicU64,
}

impl CommandPoller {
    pub fn new<F>(storage: Arc<dyn StorageAdapter>, options: ChannelOptions, handler: F) -> Self
    where
        F: Fn(Action, &Command) + Send + Sync + 'static,
    {
        Self {
            storage,
            options,
            handler: Arc::new(handler),
            session: Mutex::new(Session::default()),
            busy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Id of the most recently delivered (or reconciled) command.
    pub fn last_seen_id(&self) -> Option<String> {
        self.session().last_seen_id.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Number of ticks that returned [`TickOutcome::Busy`].
    pub fn skipped_ticks(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Runs one poll cycle.
    ///
    /// The scheduler started by [`CommandPoller::start`] calls this every
    /// interval; tests and embedders with their own timer can call it
    /// directly.
    pub async fn tick(&self) -> TickOutcome {
        if self.is_stopped() {
            return TickOutcome::Stopped;
        }
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("previous tick still running; skipping");
            return TickOutcome::Busy;
        };

        if let Some(ack_key) = self.options.ack_key.as_deref() {
            if !self.session().reconciled {
                self.reconcile(ack_key).await;
            }
        }

        let Some(command) = self.read_command().await else {
            return TickOutcome::Empty;
        };

        {
            let mut session = self.session();
            if session.last_seen_id.as_deref() == Some(command.id.as_str()) {
                return TickOutcome::AlreadyDelivered;
            }
            session.last_seen_id = Some(command.id.clone());
        }

        self.deliver(&command);

        if let Some(ack_key) = self.options.ack_key.as_deref() {
            self.acknowledge_and_clear(ack_key, &command).await;
        }

        TickOutcome::Delivered(command)
    }

    /// Starts polling every `options.interval` on the current Tokio runtime.
    ///
    /// The first tick happens one interval after the call.  Each tick runs
    /// as its own task so that a slow store shows up as skipped ticks rather
    /// than a delayed schedule.  The scheduler owns those tasks and waits for
    /// them before it exits.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(self) -> PollerHandle {
        let poller = Arc::new(self);
        // tokio intervals reject a zero period.
        let interval = poller.options.interval.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = watch::channel(false);

        info!(
            command_key = %poller.options.command_key,
            durable = poller.options.is_durable(),
            interval_ms = interval.as_millis() as u64,
            "command poller started"
        );

        let scheduled = Arc::clone(&poller);
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = JoinSet::new();
            loop {
                tokio::select! {
                    biased;
                    // Err means the handle is gone; stop either way.
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        if scheduled.is_stopped() {
                            break;
                        }
                        while ticks.try_join_next().is_some() {}
                        let poller = Arc::clone(&scheduled);
                        ticks.spawn(async move { poller.tick().await });
                    }
                }
            }
            while let Some(finished) = ticks.join_next().await {
                if let Err(e) = finished {
                    warn!("poll tick ended abnormally: {e}");
                }
            }
            debug!("poller scheduler exited");
        });

        PollerHandle {
            poller,
            stop_tx,
            task: Some(task),
        }
    }

    // ── Tick steps ────────────────────────────────────────────────────────────

    /// First-tick recovery for durable pollers.
    ///
    /// An existing ack seeds `last_seen_id`.  Without one, a command that is
    /// not newer than the published state is treated as already applied: it
    /// is acknowledged without calling the handler.
    async fn reconcile(&self, ack_key: &str) {
        let ack = read_or_absent(self.storage.as_ref(), ack_key)
            .await
            .and_then(|raw| decode::<Ack>(&raw));

        if let Some(ack) = ack {
            debug!(id = %ack.id, "resuming after acknowledged command");
            self.session().last_seen_id = Some(ack.id);
        } else {
            let state = read_or_absent(self.storage.as_ref(), &self.options.state_key)
                .await
                .and_then(|raw| decode::<State>(&raw));
            let command = self.read_command().await;

            if let (Some(state), Some(command)) = (state, command) {
                if command.ts <= state.ts {
                    info!(
                        id = %command.id,
                        command_ts = command.ts,
                        state_ts = state.ts,
                        "command predates published state; acknowledging without delivery"
                    );
                    self.session().last_seen_id = Some(command.id.clone());
                    write_best_effort(
                        self.storage.as_ref(),
                        ack_key,
                        &encode(&Ack::new(command.id)),
                    )
                    .await;
                }
            }
        }

        self.session().reconciled = true;
    }

    async fn read_command(&self) -> Option<Command> {
        let raw = read_or_absent(self.storage.as_ref(), &self.options.command_key).await?;
        decode::<Command>(&raw)
    }

    fn deliver(&self, command: &Command) {
        info!(id = %command.id, action = %command.action, "delivering command");
        let handler = Arc::clone(&self.handler);
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(command.action, command)));
        if result.is_err() {
            error!(id = %command.id, "command handler panicked; command still counts as delivered");
        }
    }

    /// Writes the ack, then clears the command key if it still holds
    /// `command`.  A newer command written meanwhile is left alone.
    async fn acknowledge_and_clear(&self, ack_key: &str, command: &Command) {
        let storage = self.storage.as_ref();
        write_best_effort(storage, ack_key, &encode(&Ack::new(command.id.clone()))).await;

        match self.read_command().await {
            Some(current) if current.id == command.id => {
                if write_best_effort(storage, &self.options.command_key, "").await {
                    debug!(id = %command.id, "command cleared");
                }
            }
            Some(current) => {
                debug!(handled = %command.id, pending = %current.id, "newer command pending; not clearing");
            }
            None => {}
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── PollerHandle ──────────────────────────────────────────────────────────────

/// Controls a running poller.  Dropping the handle stops it.
#[must_use = "dropping the handle stops the poller immediately"]
pub struct PollerHandle {
    poller: Arc<CommandPoller>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stops polling.  Idempotent.
    pub fn stop(&self) {
        if !self.poller.stopped.swap(true, Ordering::AcqRel) {
            info!(command_key = %self.poller.options.command_key, "command poller stopped");
        }
        // No receiver left just means the scheduler already exited.
        let _ = self.stop_tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.poller.is_stopped()
    }

    /// The running poller, for inspection.
    pub fn poller(&self) -> &CommandPoller {
        &self.poller
    }

    /// Stops polling and waits for the scheduler and any tick still in
    /// flight to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("poller scheduler ended abnormally: {e}");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
