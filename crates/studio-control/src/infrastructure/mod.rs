//! Infrastructure layer for studio-control.
//!
//! Contains the storage adapters the channel runs on and the TOML settings
//! file used by the CLI.
//!
//! **Dependency rule**: this layer may depend on `studio_control_core`, but
//! MUST NOT import from the `application` layer.

pub mod storage;
