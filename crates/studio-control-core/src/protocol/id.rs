//! Command identity and clock helpers.
//!
//! A command id is `<ts>-<suffix>`: the emission time in milliseconds
//! followed by eight random hex characters taken from a UUID v4.  The
//! timestamp prefix keeps ids human-sortable in logs; the suffix separates
//! two commands emitted in the same millisecond.
//!
//! Ids are compared only for equality.  Nothing parses them back.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

/// Number of random hex characters appended to the timestamp.
const SUFFIX_LEN: usize = 8;

/// Returns the current Unix time in milliseconds.
///
/// A clock set before 1970 yields 0 rather than panicking.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Generates a new command id for a command emitted at `ts`.
///
/// # Examples
///
/// ```rust
/// use studio_control_core::new_command_id;
///
/// let id = new_command_id(1_718_000_000_000);
/// assert!(id.starts_with("1718000000000-"));
/// assert_eq!(id.len(), "1718000000000-".len() + 8);
/// ```
pub fn new_command_id(ts: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{ts}-{}", &random[..SUFFIX_LEN])
}
