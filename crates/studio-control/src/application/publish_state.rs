//! PublishState use case: announcing and querying overlay visibility.
//!
//! The presenter publishes its visibility whenever it changes; anyone can
//! read it back without waiting for a command round trip.  Publication is
//! independent of command delivery: nothing forces a handler to publish, it
//! is simply the expected wiring.
//!
//! A query returns `None` for "unknown" (nothing published yet, a corrupt
//! value, or a storage failure).  Callers must not read `None` as "closed".

use std::sync::Arc;

use studio_control_core::{decode, encode, ChannelOptions, State};
use tracing::{debug, info};

use crate::infrastructure::storage::{read_or_absent, write_best_effort, StorageAdapter};

/// Publishes and reads the presenter's visibility state.
pub struct StatePublisher {
    storage: Arc<dyn StorageAdapter>,
    options: ChannelOptions,
}

impl StatePublisher {
    pub fn new(storage: Arc<dyn StorageAdapter>, options: ChannelOptions) -> Self {
        Self { storage, options }
    }

    /// Publishes `open` as the current visibility.  Best effort.
    pub async fn publish(&self, open: bool) -> State {
        let state = State::new(open, self.options.source.clone());
        if write_best_effort(self.storage.as_ref(), &self.options.state_key, &encode(&state)).await
        {
            info!(open, key = %self.options.state_key, "state published");
        }
        state
    }

    /// Returns the last published visibility, or `None` when unknown.
    pub async fn query(&self) -> Option<bool> {
        self.query_state().await.map(|state| state.open)
    }

    /// Returns the full last published state, or `None` when unknown.
    pub async fn query_state(&self) -> Option<State> {
        let raw = read_or_absent(self.storage.as_ref(), &self.options.state_key).await?;
        let state = decode::<State>(&raw);
        if state.is_none() {
            debug!(key = %self.options.state_key, "state value present but not well-formed");
        }
        state
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
