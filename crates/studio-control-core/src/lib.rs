//! # studio-control-core
//!
//! Shared library for the studio-control signaling channel containing the
//! message types, the JSON codec, command identity generation, and the
//! channel options.
//!
//! This crate has zero dependencies on storage backends, async runtimes, or
//! UI frameworks.  The runtime pieces (emitter, publisher, poller, storage
//! adapters) live in the `studio-control` crate.
//!
//! # Architecture overview (for beginners)
//!
//! Two actors that cannot call each other directly need to agree on whether
//! an overlay UI is visible:
//!
//! - The **controller** wants to show, hide, or toggle the overlay.
//! - The **presenter** owns the overlay and decides its visibility.
//!
//! They share nothing but a key-value store of strings.  The controller
//! writes a *command* under one key; the presenter polls that key, acts on
//! each new command exactly once, records an *ack* under a second key, and
//! publishes its current visibility as a *state* under a third key.
//!
//! This crate defines:
//!
//! - **`protocol`** – The three message shapes (`Command`, `Ack`, `State`),
//!   how they are encoded to strings and validated when decoded, and how
//!   command ids are generated.
//!
//! - **`domain`** – `ChannelOptions`: the key names, poll interval and
//!   source tag that together identify one channel.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `studio_control_core::Command` instead of the full module path.
pub use domain::options::{ChannelOptions, OptionsError};
pub use protocol::codec::{decode, encode, try_decode, DecodeError, Message};
pub use protocol::id::{new_command_id, now_millis};
pub use protocol::messages::{Ack, Action, Command, State};
