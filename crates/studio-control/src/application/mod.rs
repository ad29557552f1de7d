//! Application layer use cases for studio-control.
//!
//! # What is the "application" layer? (for beginners)
//!
//! Use cases here orchestrate the protocol messages from
//! `studio_control_core` against the [`StorageAdapter`] abstraction.  They
//! never know which backend they are talking to, so the same code runs on
//! an in-memory map in tests and on a shared JSON file in production.
//!
//! # Sub-modules
//!
//! - **`emit_command`**  – Controller side: writes show/hide/toggle commands.
//!
//! - **`poll_commands`** – Presenter side: polls for new commands, delivers
//!   each one at most once per poller, acknowledges and clears it.  Across
//!   presenter restarts a command may be delivered again (minimal mode, or
//!   a crash before the ack lands).
//!
//! - **`publish_state`** – Presenter side: publishes visibility; anyone can
//!   query it.
//!
//! - **`channel`**       – `StudioControl`, the facade bundling all three
//!   behind one validated set of options.
//!
//! [`StorageAdapter`]: crate::infrastructure::storage::StorageAdapter

pub mod channel;
pub mod emit_command;
pub mod poll_commands;
pub mod publish_state;
