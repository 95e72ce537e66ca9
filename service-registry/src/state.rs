//! Single-use OAuth `state` values for the browser redirect flow.
//!
//! Each state is bound to the `user_id` the resulting token will be stored
//! under, so the callback never has to trust a user id from the query string.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// A pending authorization.
#[derive(Clone, Debug)]
pub struct PendingAuth {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory table of pending authorizations with expiry.
#[derive(Clone)]
pub struct StateManager {
    states: Arc<Mutex<HashMap<String, PendingAuth>>>,
    expiry: Duration,
}

impl StateManager {
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            expiry: Duration::seconds(expiry_seconds),
        }
    }

    // Entries are plain data, so a poisoned table is still consistent.
    fn states(&self) -> MutexGuard<'_, HashMap<String, PendingAuth>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mints a UUID v4 state bound to `user_id`.
    pub fn create_state(&self, user_id: &str) -> String {
        let state = Uuid::new_v4().to_string();
        self.states().insert(
            state.clone(),
            PendingAuth {
                user_id: user_id.to_string(),
                created_at: Utc::now(),
            },
        );
        state
    }

    /// Removes the state and returns its entry if it had not expired.
    pub fn validate_and_consume(&self, state: &str) -> Option<PendingAuth> {
        let entry = self.states().remove(state)?;
        if Utc::now() - entry.created_at > self.expiry {
            return None;
        }
        Some(entry)
    }

    /// Drops expired entries, returning how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut states = self.states();
        let before = states.len();
        states.retain(|_, entry| now - entry.created_at <= self.expiry);
        before - states.len()
    }

    pub fn count(&self) -> usize {
        self.states().len()
    }
}

/// Periodically drops expired states.
pub async fn run_state_cleanup(manager: StateManager, interval_seconds: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        let removed = manager.cleanup_expired();
        tracing::debug!(
            removed = removed,
            remaining = manager.count(),
            "OAuth state cleanup complete"
        );
    }
}
