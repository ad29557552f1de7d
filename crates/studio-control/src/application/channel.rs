//! `StudioControl`: one channel, both sides.
//!
//! Bundles the emitter, the publisher and poller construction behind a
//! single validated [`ChannelOptions`].  A controller process typically only
//! calls `show`/`hide`/`toggle` and `is_shown`; a presenter calls
//! `start_polling` and `publish_state`.  Nothing stops one process from
//! doing both.

use std::sync::Arc;

use studio_control_core::{Action, ChannelOptions, Command, OptionsError, State};

use super::emit_command::CommandEmitter;
use super::poll_commands::{CommandPoller, PollerHandle};
use super::publish_state::StatePublisher;
use crate::infrastructure::storage::StorageAdapter;

/// Entry point to a studio-control channel.
pub struct StudioControl {
    storage: Arc<dyn StorageAdapter>,
    options: ChannelOptions,
    emitter: CommandEmitter,
    publisher: StatePublisher,
}

impl StudioControl {
    /// Opens a channel on `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] when a key is empty or the interval is zero.
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        options: ChannelOptions,
    ) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Self {
            emitter: CommandEmitter::new(Arc::clone(&storage), options.clone()),
            publisher: StatePublisher::new(Arc::clone(&storage), options.clone()),
            storage,
            options,
        })
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    // ── Controller side ───────────────────────────────────────────────────────

    pub async fn emit(&self, action: Action) -> Command {
        self.emitter.emit(action).await
    }

    pub async fn show(&self) -> Command {
        self.emitter.show().await
    }

    pub async fn hide(&self) -> Command {
        self.emitter.hide().await
    }

    pub async fn toggle(&self) -> Command {
        self.emitter.toggle().await
    }

    /// Last published visibility; `None` means unknown.
    pub async fn is_shown(&self) -> Option<bool> {
        self.publisher.query().await
    }

    pub async fn query_state(&self) -> Option<State> {
        self.publisher.query_state().await
    }

    // ── Presenter side ────────────────────────────────────────────────────────

    pub async fn publish_state(&self, open: bool) -> State {
        self.publisher.publish(open).await
    }

    /// Builds a poller without starting it.  Useful when the caller drives
    /// [`CommandPoller::tick`] from its own timer.
    pub fn poller<F>(&self, handler: F) -> CommandPoller
    where
        F: Fn(Action, &Command) + Send + Sync + 'static,
    {
        CommandPoller::new(Arc::clone(&self.storage), self.options.clone(), handler)
    }

    /// Starts polling for commands on the current Tokio runtime.
    pub fn start_polling<F>(&self, handler: F) -> PollerHandle
    where
        F: Fn(Action, &Command) + Send + Sync + 'static,
    {
        self.poller(handler).start()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
