//! EmitCommand use case: the controller side of the channel.
//!
//! Builds a fresh [`Command`] and writes it to the command key.  Emission is
//! fire-and-forget: a failed write is logged and otherwise ignored, and the
//! caller learns nothing about whether a presenter will ever see it.
//!
//! The key holds one command at a time.  Emitting twice before the presenter
//! polls overwrites the first command, which is then never delivered.  The
//! channel carries "the desired state", not an event log.

use std::sync::Arc;

use studio_control_core::{encode, Action, ChannelOptions, Command};
use tracing::{debug, info};

use crate::infrastructure::storage::{write_best_effort, StorageAdapter};

/// Writes show/hide/toggle commands for a presenter to pick up.
pub struct CommandEmitter {
    storage: Arc<dyn StorageAdapter>,
    options: ChannelOptions,
}

impl CommandEmitter {
    pub fn new(storage: Arc<dyn StorageAdapter>, options: ChannelOptions) -> Self {
        Self { storage, options }
    }

    /// Emits a command carrying `action`.
    ///
    /// Returns the command that was built, for logging and diagnostics.  It is
    /// returned even when the write failed; this is not a delivery receipt.
    pub async fn emit(&self, action: Action) -> Command {
        let command = Command::new(action, self.options.source.clone());
        let written = write_best_effort(
            self.storage.as_ref(),
            &self.options.command_key,
            &encode(&command),
        )
        .await;
        if written {
            info!(id = %command.id, %action, key = %self.options.command_key, "command emitted");
        } else {
            debug!(id = %command.id, %action, "command emission dropped");
        }
        command
    }

    pub async fn show(&self) -> Command {
        self.emit(Action::Show).await
    }

    pub async fn hide(&self) -> Command {
        self.emit(Action::Hide).await
    }

    /// Emits `toggle`.  Only the presenter knows what that resolves to.
    pub async fn toggle(&self) -> Command {
        self.emit(Action::Toggle).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
