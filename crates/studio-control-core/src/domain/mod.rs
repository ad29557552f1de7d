//! Domain layer for studio-control.
//!
//! Pure configuration types with no I/O.  Reading these values from a file
//! or the command line is the job of the runtime crate.

pub mod options;

pub use options::{ChannelOptions, OptionsError};
