//! studio-control library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # Quick tour (for beginners)
//!
//! ```text
//! controller                      store                      presenter
//! ──────────                      ─────                      ─────────
//! StudioControl::show() ──▶ command key ──▶ CommandPoller::tick() ──▶ handler
//!                                 ack key   ◀── ack + clear
//! StudioControl::is_shown() ◀── state key ◀── StudioControl::publish_state()
//! ```
//!
//! Message types and channel options come from `studio_control_core` and are
//! re-exported here for convenience.

pub mod application;
pub mod infrastructure;

pub use application::channel::StudioControl;
pub use application::poll_commands::{CommandPoller, PollerHandle, TickOutcome};
pub use infrastructure::storage::json_file::JsonFileStorage;
pub use infrastructure::storage::memory::MemoryStorage;
pub use infrastructure::storage::{StorageAdapter, StorageError};
pub use studio_control_core::{Ack, Action, ChannelOptions, Command, OptionsError, State};
