//! The three message shapes stored by the signaling channel.
//!
//! Every message is a small JSON object stored as a string under its own
//! key.  There is at most one live value per key; a newer write replaces the
//! older one.
//!
//! ```json
//! {"id":"1718000000000-4f9c2a1b","action":"show","ts":1718000000000,"source":"launcher"}
//! {"id":"1718000000000-4f9c2a1b","ts":1718000000420}
//! {"open":true,"ts":1718000000431,"source":"overlay"}
//! ```
//!
//! # Lenient fields
//!
//! Values may have been written by other implementations of the same
//! protocol, so decoding is forgiving where it can be without losing meaning:
//!
//! - Unknown fields are ignored.
//! - `ts` accepts any finite JSON number; fractional milliseconds are
//!   truncated.  Two timestamps within the same millisecond therefore compare
//!   equal, so a command and a state stamped 1000.5 and 1000.2 count as
//!   simultaneous and the command is treated as already applied.
//! - An ack only needs its `id`; a missing or mistyped `ts` reads as 0.
//! - A `source` that is not a string is treated as absent.
//!
//! Required fields (`id`, `action`, `open`, `ts`) are still strict: a value
//! missing one of them, or carrying the wrong JSON type, does not decode.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::protocol::codec::{DecodeError, Message};
use crate::protocol::id::{new_command_id, now_millis};

// ── Action ────────────────────────────────────────────────────────────────────

/// The visibility change a controller is asking for.
///
/// `Toggle` is delivered as-is: the protocol never resolves it against the
/// current state.  The presenter's handler decides what "toggle" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Show,
    Hide,
    Toggle,
}

impl Action {
    /// Returns the wire name of the action (`"show"`, `"hide"`, `"toggle"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Show => "show",
            Action::Hide => "hide",
            Action::Toggle => "toggle",
        }
    }

    /// Resolves the action against the presenter's current visibility.
    ///
    /// This is a convenience for handlers; the protocol itself never calls it.
    pub fn apply(self, currently_open: bool) -> bool {
        match self {
            Action::Show => true,
            Action::Hide => false,
            Action::Toggle => !currently_open,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A single requested visibility change.
///
/// `id` is the sole identity used for deduplication: two commands are the
/// same event if and only if their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Unique per emission: `<ts>-<random suffix>`.
    pub id: String,
    pub action: Action,
    /// Emission time in Unix milliseconds.
    #[serde(deserialize_with = "de_millis")]
    pub ts: i64,
    /// Optional diagnostic tag naming the emitter.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_lenient_source"
    )]
    pub source: Option<String>,
}

impl Command {
    /// Builds a fresh command stamped with the current time and a new id.
    pub fn new(action: Action, source: Option<String>) -> Self {
        Self::with_timestamp(action, now_millis(), source)
    }

    /// Builds a command with an explicit timestamp.
    pub fn with_timestamp(action: Action, ts: i64, source: Option<String>) -> Self {
        Self {
            id: new_command_id(ts),
            action,
            ts,
            source,
        }
    }
}

impl Message for Command {
    const KIND: &'static str = "command";
}

// ── Ack ───────────────────────────────────────────────────────────────────────

/// Record of the most recently delivered command id.
///
/// Written only by the poller.  It exists so a poller that restarts does not
/// hand the same command to its handler a second time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub id: String,
    /// When the delivery was recorded, in Unix milliseconds.  Informational.
    #[serde(default, deserialize_with = "de_lenient_millis")]
    pub ts: i64,
}

impl Ack {
    /// Acknowledges `id` at the current time.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ts: now_millis(),
        }
    }
}

impl Message for Ack {
    const KIND: &'static str = "ack";

    fn validate(&self) -> Result<(), DecodeError> {
        // An ack without an id cannot seed deduplication.
        if self.id.is_empty() {
            return Err(DecodeError::Invalid {
                kind: Self::KIND,
                reason: "id is empty".to_string(),
            });
        }
        Ok(())
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// The presenter's last published visibility.  Latest write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub open: bool,
    /// Publication time in Unix milliseconds.
    #[serde(deserialize_with = "de_millis")]
    pub ts: i64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_lenient_source"
    )]
    pub source: Option<String>,
}

impl State {
    /// Builds a state stamped with the current time.
    pub fn new(open: bool, source: Option<String>) -> Self {
        Self {
            open,
            ts: now_millis(),
            source,
        }
    }
}

impl Message for State {
    const KIND: &'static str = "state";
}

// ── Field helpers ─────────────────────────────────────────────────────────────

/// Accepts any finite JSON number as a millisecond timestamp.
///
/// Fractions are truncated toward zero, which makes sub-millisecond ordering
/// invisible to the `command.ts <= state.ts` reconciliation check.
fn de_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    millis_from(&number).ok_or_else(|| D::Error::custom("timestamp is not a finite number"))
}

/// Like [`de_millis`], but anything that is not a number reads as 0.
fn de_lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => Ok(millis_from(&number).unwrap_or(0)),
        _ => Ok(0),
    }
}

fn millis_from(number: &serde_json::Number) -> Option<i64> {
    number
        .as_i64()
        .or_else(|| number.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
        .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// `source` is informational only, so a mistyped value is dropped rather than
/// rejecting the whole message.
fn de_lenient_source<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Action ────────────────────────────────────────────────────────────────

    #[test]
    fn test_action_serializes_lowercase() {
        // Arrange / Act
        let json = serde_json::to_string(&Action::Toggle).unwrap();

        // Assert
        assert_eq!(json, r#""toggle""#);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result: Result<Action, _> = serde_json::from_str(r#""flip""#);
        assert!(result.is_err(), "actions form a closed set");
    }

    #[test]
    fn test_action_display_matches_wire_name() {
        assert_eq!(Action::Show.to_string(), "show");
        assert_eq!(Action::Hide.to_string(), "hide");
        assert_eq!(Action::Toggle.to_string(), "toggle");
    }

    #[test]
    fn test_action_apply_resolves_against_current_visibility() {
        assert!(Action::Show.apply(false));
        assert!(!Action::Hide.apply(true));
        assert!(Action::Toggle.apply(false));
        assert!(!Action::Toggle.apply(true));
    }

    // ── Command ───────────────────────────────────────────────────────────────

    #[test]
    fn test_command_new_id_starts_with_timestamp() {
        // Arrange / Act
        let cmd = Command::new(Action::Show, None);

        // Assert
        assert!(
            cmd.id.starts_with(&format!("{}-", cmd.ts)),
            "id {} must be prefixed by its timestamp {}",
            cmd.id,
            cmd.ts
        );
    }

    #[test]
    fn test_command_without_source_omits_field() {
        let cmd = Command::with_timestamp(Action::Hide, 10, None);
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(!json.contains("source"), "None source must be omitted: {json}");
    }

    #[test]
    fn test_command_with_source_serializes_field() {
        let cmd = Command::with_timestamp(Action::Hide, 10, Some("cli".to_string()));
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""source":"cli""#));
        assert!(json.contains(r#""action":"hide""#));
    }

    #[test]
    fn test_command_fractional_timestamp_is_truncated() {
        // Arrange
        let json = r#"{"id":"a","action":"show","ts":1718.9}"#;

        // Act
        let cmd: Command = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(cmd.ts, 1718);
    }

    #[test]
    fn test_command_string_timestamp_is_rejected() {
        let json = r#"{"id":"a","action":"show","ts":"1718"}"#;
        assert!(serde_json::from_str::<Command>(json).is_err());
    }

    #[test]
    fn test_command_non_string_source_is_dropped() {
        let json = r#"{"id":"a","action":"show","ts":1,"source":42}"#;
        let cmd: Command = serde_json::from_str(json).unwrap();
        assert_eq!(cmd.source, None);
    }

    #[test]
    fn test_command_numeric_id_is_rejected() {
        let json = r#"{"id":7,"action":"show","ts":1}"#;
        assert!(serde_json::from_str::<Command>(json).is_err());
    }

    // ── Ack ───────────────────────────────────────────────────────────────────

    #[test]
    fn test_ack_missing_ts_defaults_to_zero() {
        let ack: Ack = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(ack.id, "x");
        assert_eq!(ack.ts, 0);
    }

    #[test]
    fn test_ack_with_null_or_mistyped_ts_reads_as_zero() {
        // Arrange
        let inputs = [r#"{"id":"x","ts":null}"#, r#"{"id":"x","ts":"soon"}"#];

        for input in inputs {
            // Act
            let ack: Ack = serde_json::from_str(input).unwrap();

            // Assert
            assert_eq!(ack.id, "x", "input: {input}");
            assert_eq!(ack.ts, 0, "input: {input}");
        }
    }

    #[test]
    fn test_same_millisecond_fractions_compare_equal() {
        // Arrange
        let command = r#"{"id":"c","action":"show","ts":1000.5}"#;
        let state = r#"{"open":true,"ts":1000.2}"#;

        // Act
        let command: Command = serde_json::from_str(command).unwrap();
        let state: State = serde_json::from_str(state).unwrap();

        // Assert: truncation makes the command count as not newer than the state
        assert_eq!(command.ts, 1000);
        assert_eq!(state.ts, 1000);
        assert!(command.ts <= state.ts);
    }

    #[test]
    fn test_ack_with_empty_id_fails_validation() {
        let ack = Ack { id: String::new(), ts: 1 };
        assert!(ack.validate().is_err());
    }

    #[test]
    fn test_ack_new_stamps_current_time() {
        let ack = Ack::new("abc");
        assert_eq!(ack.id, "abc");
        assert!(ack.ts > 0);
    }

    // ── State ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_state_non_boolean_open_is_rejected() {
        let json = r#"{"open":"yes","ts":1}"#;
        assert!(serde_json::from_str::<State>(json).is_err());
    }

    #[test]
    fn test_state_missing_ts_is_rejected() {
        let json = r#"{"open":true}"#;
        assert!(serde_json::from_str::<State>(json).is_err());
    }

    #[test]
    fn test_state_ignores_unknown_fields() {
        // Arrange: a newer writer added a field we do not know about
        let json = r#"{"open":false,"ts":5,"source":"overlay","theme":"dark"}"#;

        // Act
        let state: State = serde_json::from_str(json).unwrap();

        // Assert
        assert!(!state.open);
        assert_eq!(state.ts, 5);
        assert_eq!(state.source.as_deref(), Some("overlay"));
    }
}
