//! Persisted per-user OAuth credentials.
//!
//! One [`CredentialRecord`] is kept per user identity. Records are created by
//! the first successful authorization-code exchange, overwritten by a later
//! re-authentication and removed either explicitly or by an expiry sweep.
//! There is no refresh-token renewal: once `expires_at` passes, the only way
//! back to a usable credential is a fresh exchange.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       TokenStore (trait)                 │
//! │  - upsert / lookup / validity lookup     │
//! │  - delete / enumerate / expiry sweep     │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (SQLite)           │
//! │  - AES-256-GCM secrets at rest           │
//! │  - single-row atomic upserts             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use linkgate::credentials::{CredentialStore, TokenPayload, TokenStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let key = std::env::var("LINKGATE_ENCRYPTION_KEY")?;
//! let store = CredentialStore::new("linkedin_tokens.db", &key)?;
//!
//! let payload = TokenPayload {
//!     access_token: "AQV...".to_string(),
//!     expires_in: Some(5_184_000),
//!     ..Default::default()
//! };
//! store.store("alice", &payload, Some("alice@example.com"))?;
//!
//! if let Some(record) = store.get_valid("alice")? {
//!     println!("token type: {}", record.token_type);
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

mod encryption;
mod storage;

pub use encryption::{validate_key, TokenCipher};
pub use storage::CredentialStore;

/// Token type recorded when the provider does not name one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Token endpoint response as returned by the OAuth provider.
///
/// Only `access_token` is mandatory; everything else is optional and unknown
/// fields are ignored.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct TokenPayload {
    pub access_token: String,

    /// Lifetime relative to the moment of storage, in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPayload")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Stored credential for a single user.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: String,

    /// Bearer secret; never empty once stored.
    pub access_token: String,

    /// Kept for completeness, never used for renewal.
    pub refresh_token: Option<String>,

    pub token_type: String,

    /// `None` means the token does not expire.
    pub expires_at: Option<DateTime<Utc>>,

    pub scope: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// A record is valid iff it has no expiry or expires strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// First characters of the access token, for admin listings.
    pub fn token_preview(&self, len: usize) -> String {
        let preview: String = self.access_token.chars().take(len).collect();
        format!("{}...", preview)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("email", &self.email)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Durable per-user credential storage.
///
/// Every operation is a self-contained read or single-record write keyed by
/// `user_id`, so implementations can be shared across concurrent requests
/// without cross-request locking.
pub trait TokenStore: Send + Sync {
    /// Inserts or updates the record for `user_id` and returns the
    /// post-write state. `created_at` survives updates; `updated_at` does not.
    fn store(
        &self,
        user_id: &str,
        payload: &TokenPayload,
        email: Option<&str>,
    ) -> Result<CredentialRecord>;

    /// Raw lookup, ignores expiry.
    fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>>;

    /// Lookup that hides records whose `expires_at` is not in the future.
    fn get_valid(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let now = Utc::now();
        Ok(self.get(user_id)?.filter(|record| record.is_valid_at(now)))
    }

    /// Returns `true` iff a record existed and was removed.
    fn delete(&self, user_id: &str) -> Result<bool>;

    fn list_all(&self) -> Result<Vec<CredentialRecord>>;

    /// Removes every record whose `expires_at` has passed.
    fn sweep_expired(&self) -> Result<usize>;
}

/// Periodically removes expired credentials.
pub async fn run_token_sweep(store: Arc<dyn TokenStore>, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        match store.sweep_expired() {
            Ok(0) => tracing::debug!("Token sweep complete, nothing expired"),
            Ok(removed) => tracing::info!(removed, "Removed expired tokens"),
            Err(e) => tracing::warn!(error = %e, "Token sweep failed"),
        }
    }
}
