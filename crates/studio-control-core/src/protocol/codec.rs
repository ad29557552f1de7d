//! JSON codec for the values stored under the channel keys.
//!
//! Storage holds plain strings.  Encoding turns a message into its canonical
//! JSON text; decoding parses and validates a stored string.
//!
//! # Two decode flavours
//!
//! - [`try_decode`] returns a [`DecodeError`] describing *why* a stored value
//!   was rejected.  Use it when the reason matters (diagnostics, tests).
//! - [`decode`] returns `None` for every rejected value.  The protocol engine
//!   uses this one: a corrupt, half-written or cleared value is treated
//!   exactly like "no message", so callers never need an error path for it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors explaining why a stored string is not a valid message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The stored value is empty (never written, or cleared after delivery).
    #[error("stored value is empty")]
    Empty,

    /// The value is not JSON, or its JSON shape does not match the message.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The value parsed but failed a semantic check.
    #[error("invalid {kind}: {reason}")]
    Invalid { kind: &'static str, reason: String },
}

/// Implemented by every message shape the channel stores.
pub trait Message: Serialize + DeserializeOwned {
    /// Short name used in diagnostics (`"command"`, `"ack"`, `"state"`).
    const KIND: &'static str;

    /// Extra validation applied after a successful parse.
    fn validate(&self) -> Result<(), DecodeError> {
        Ok(())
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a message into its canonical JSON string.
///
/// Never fails for the message types in this crate: they contain only
/// strings, booleans and integers.  Should serialization ever fail, the empty
/// string is returned, which every reader decodes as "absent".
///
/// # Examples
///
/// ```rust
/// use studio_control_core::{decode, encode, Action, Command};
///
/// let cmd = Command::with_timestamp(Action::Show, 1_000, None);
/// let text = encode(&cmd);
/// assert_eq!(decode::<Command>(&text), Some(cmd));
/// ```
pub fn encode<M: Message>(message: &M) -> String {
    serde_json::to_string(message).unwrap_or_default()
}

/// Parses and validates a stored string.
///
/// # Errors
///
/// Returns [`DecodeError::Empty`] for blank input, [`DecodeError::Malformed`]
/// when the JSON does not parse into `M` (this includes `null` and missing or
/// mistyped required fields), and [`DecodeError::Invalid`] when the parsed
/// value fails [`Message::validate`].
pub fn try_decode<M: Message>(raw: &str) -> Result<M, DecodeError> {
    if raw.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    let message: M = serde_json::from_str(raw).map_err(|source| DecodeError::Malformed {
        kind: M::KIND,
        source,
    })?;
    message.validate()?;
    Ok(message)
}

/// Parses and validates a stored string, mapping every failure to `None`.
///
/// # Examples
///
/// ```rust
/// use studio_control_core::{decode, State};
///
/// assert_eq!(decode::<State>("not json"), None);
/// assert_eq!(decode::<State>(""), None);
/// assert!(decode::<State>(r#"{"open":true,"ts":1}"#).is_some());
/// ```
pub fn decode<M: Message>(raw: &str) -> Option<M> {
    match try_decode(raw) {
        Ok(message) => Some(message),
        Err(DecodeError::Empty) => None,
        Err(e) => {
            debug!("discarding stored value: {e}");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
