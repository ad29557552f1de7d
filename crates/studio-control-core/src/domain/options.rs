//! Channel options.
//!
//! [`ChannelOptions`] names the three storage keys that make up one channel,
//! the poll interval, and the optional source tag stamped on emitted
//! commands and published states.
//!
//! # Independent channels
//!
//! The defaults are fixed, distinct strings so that uncoordinated processes
//! using `ChannelOptions::default()` meet on the same channel.  Tests (or
//! applications hosting several overlays) build channels with their own
//! keys; nothing is held in global state.
//!
//! # Minimal mode
//!
//! Setting `ack_key` to `None` selects the minimal delivery mode: the poller
//! remembers the last delivered id in memory only, never writes an ack and
//! never clears the command key.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Default key holding the pending command.
pub const DEFAULT_COMMAND_KEY: &str = "comerge:studio-control:command";
/// Default key holding the last delivery acknowledgment.
pub const DEFAULT_ACK_KEY: &str = "comerge:studio-control:ack";
/// Default key holding the published visibility state.
pub const DEFAULT_STATE_KEY: &str = "comerge:studio-control:state";
/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(300);

/// Reasons a set of options cannot drive a channel.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// One of the key names is the empty string.
    #[error("{0} key must not be empty")]
    EmptyKey(&'static str),

    /// A zero interval would make the poller spin.
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// Everything that identifies and tunes one signaling channel.
///
/// # Example
///
/// ```rust
/// use studio_control_core::ChannelOptions;
/// use std::time::Duration;
///
/// let opts = ChannelOptions::default()
///     .with_source("launcher")
///     .with_interval(Duration::from_millis(100));
/// assert!(opts.validate().is_ok());
/// assert_eq!(opts.source.as_deref(), Some("launcher"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Key the controller writes commands to and the poller reads.
    pub command_key: String,
    /// Key the poller records deliveries under.  `None` selects minimal mode.
    pub ack_key: Option<String>,
    /// Key the presenter publishes its visibility under.
    pub state_key: String,
    /// Period between poller ticks.
    pub interval: Duration,
    /// Diagnostic tag attached to emitted commands and published states.
    pub source: Option<String>,
}

impl Default for ChannelOptions {
    /// | Field       | Default                          |
    /// |-------------|----------------------------------|
    /// | command_key | `comerge:studio-control:command` |
    /// | ack_key     | `comerge:studio-control:ack`     |
    /// | state_key   | `comerge:studio-control:state`   |
    /// | interval    | 300 ms                           |
    /// | source      | none                             |
    fn default() -> Self {
        Self {
            command_key: DEFAULT_COMMAND_KEY.to_string(),
            ack_key: Some(DEFAULT_ACK_KEY.to_string()),
            state_key: DEFAULT_STATE_KEY.to_string(),
            interval: DEFAULT_INTERVAL,
            source: None,
        }
    }
}

impl ChannelOptions {
    /// Derives all three keys from a common prefix: `<prefix>:command`,
    /// `<prefix>:ack`, `<prefix>:state`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            command_key: format!("{prefix}:command"),
            ack_key: Some(format!("{prefix}:ack")),
            state_key: format!("{prefix}:state"),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Switches to minimal mode (no ack key).
    pub fn minimal(mut self) -> Self {
        self.ack_key = None;
        self
    }

    /// `true` when deliveries are recorded durably under an ack key.
    pub fn is_durable(&self) -> bool {
        self.ack_key.is_some()
    }

    /// Checks the options can drive a channel.
    ///
    /// Colliding key names are allowed, because the protocol does not need
    /// distinct keys to function, but a warning is logged since messages of
    /// different kinds will overwrite each other.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError::EmptyKey`] for an empty key name and
    /// [`OptionsError::ZeroInterval`] for a zero poll interval.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.command_key.is_empty() {
            return Err(OptionsError::EmptyKey("command"));
        }
        if self.state_key.is_empty() {
            return Err(OptionsError::EmptyKey("state"));
        }
        if self.ack_key.as_deref() == Some("") {
            return Err(OptionsError::EmptyKey("ack"));
        }
        if self.interval.is_zero() {
            return Err(OptionsError::ZeroInterval);
        }

        let ack = self.ack_key.as_deref();
        if self.command_key == self.state_key
            || ack == Some(self.command_key.as_str())
            || ack == Some(self.state_key.as_str())
        {
            warn!(
                command_key = %self.command_key,
                state_key = %self.state_key,
                ack_key = ?self.ack_key,
                "channel keys collide; messages will overwrite each other"
            );
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
