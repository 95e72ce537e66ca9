//! SQLite-backed credential storage.
//!
//! Access and refresh tokens are sealed with AES-256-GCM before they reach
//! disk; everything else is stored in the clear so the expiry sweep can run
//! as a single SQL statement.

use super::{CredentialRecord, TokenCipher, TokenPayload, TokenStore, DEFAULT_TOKEN_TYPE};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    SELECT user_id,
           access_token, access_token_nonce,
           refresh_token, refresh_token_nonce,
           token_type, expires_at, scope, email,
           created_at, updated_at
    FROM linkedin_tokens
"#;

/// Credential storage backed by a single SQLite table.
///
/// # Schema
/// ```sql
/// CREATE TABLE linkedin_tokens (
///     user_id TEXT PRIMARY KEY,
///     access_token TEXT NOT NULL,        -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     refresh_token TEXT,                -- Encrypted (optional)
///     refresh_token_nonce TEXT,
///     token_type TEXT NOT NULL DEFAULT 'Bearer',
///     expires_at TEXT,                   -- RFC 3339 UTC, fixed width
///     scope TEXT,
///     email TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// Timestamps are always written as `YYYY-MM-DDTHH:MM:SS.ffffffZ`, which makes
/// lexical order equal to chronological order.
///
/// # Thread Safety
/// The connection sits behind a `Mutex`; each public operation holds the lock
/// for its whole read or write, so readers never observe a half-written record.
pub struct CredentialStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

/// Row as it sits on disk, before decryption and timestamp parsing.
struct StoredRow {
    user_id: String,
    access_token: String,
    access_token_nonce: String,
    refresh_token: Option<String>,
    refresh_token_nonce: Option<String>,
    token_type: String,
    expires_at: Option<String>,
    scope: Option<String>,
    email: Option<String>,
    created_at: String,
    updated_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            access_token: row.get(1)?,
            access_token_nonce: row.get(2)?,
            refresh_token: row.get(3)?,
            refresh_token_nonce: row.get(4)?,
            token_type: row.get(5)?,
            expires_at: row.get(6)?,
            scope: row.get(7)?,
            email: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_record(self, cipher: &TokenCipher) -> Result<CredentialRecord> {
        let access_token = cipher
            .open(&self.access_token, &self.access_token_nonce)
            .with_context(|| format!("Failed to decrypt access token for '{}'", self.user_id))?;
        let refresh_token = cipher
            .open_optional(self.refresh_token, self.refresh_token_nonce)
            .with_context(|| format!("Failed to decrypt refresh token for '{}'", self.user_id))?;

        Ok(CredentialRecord {
            access_token,
            refresh_token,
            token_type: self.token_type,
            expires_at: self.expires_at.as_deref().map(parse_timestamp).transpose()?,
            scope: self.scope,
            email: self.email,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            user_id: self.user_id,
        })
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Expiry `expires_in` seconds after `now`, kept inside the four-digit years
/// that `format_timestamp` writes at fixed width.
fn expiry_after(now: DateTime<Utc>, expires_in: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .filter(|expires_at| (0..=9999).contains(&expires_at.year()))
        .ok_or_else(|| anyhow!("expires_in {} is out of range", expires_in))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse timestamp '{}'", s))
}

impl CredentialStore {
    /// Opens (or creates) the database at `db_path` and ensures the schema.
    ///
    /// `encryption_key` is a base64-encoded 32-byte key. Pass `":memory:"` as
    /// the path for a throwaway store.
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS linkedin_tokens (
                user_id TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                refresh_token TEXT,
                refresh_token_nonce TEXT,
                token_type TEXT NOT NULL DEFAULT 'Bearer',
                expires_at TEXT,
                scope TEXT,
                email TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create linkedin_tokens table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tokens_expires_at ON linkedin_tokens(expires_at)",
            [],
        )
        .context("Failed to create index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential store lock poisoned"))
    }

    fn select_one(&self, conn: &Connection, user_id: &str) -> Result<Option<CredentialRecord>> {
        let row = conn
            .query_row(
                &format!("{} WHERE user_id = ?1", SELECT_COLUMNS),
                params![user_id],
                StoredRow::from_row,
            )
            .optional()
            .context("Failed to query credentials")?;

        row.map(|row| row.into_record(&self.cipher)).transpose()
    }
}

impl TokenStore for CredentialStore {
    fn store(
        &self,
        user_id: &str,
        payload: &TokenPayload,
        email: Option<&str>,
    ) -> Result<CredentialRecord> {
        if payload.access_token.is_empty() {
            bail!("Refusing to store an empty access token for '{}'", user_id);
        }

        let now = Utc::now();
        let expires_at = payload
            .expires_in
            .map(|seconds| expiry_after(now, seconds).map(format_timestamp))
            .transpose()
            .with_context(|| format!("Invalid token lifetime for '{}'", user_id))?;

        let (access_token, access_token_nonce) = self
            .cipher
            .seal(&payload.access_token)
            .context("Failed to encrypt access token")?;
        let (refresh_token, refresh_token_nonce) = self
            .cipher
            .seal_optional(payload.refresh_token.as_deref())
            .context("Failed to encrypt refresh token")?;

        let token_type = payload
            .token_type
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_TYPE);
        let now = format_timestamp(now);

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO linkedin_tokens (
                user_id,
                access_token, access_token_nonce,
                refresh_token, refresh_token_nonce,
                token_type, expires_at, scope, email,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                access_token_nonce = excluded.access_token_nonce,
                refresh_token = excluded.refresh_token,
                refresh_token_nonce = excluded.refresh_token_nonce,
                token_type = excluded.token_type,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                email = excluded.email,
                updated_at = excluded.updated_at
            "#,
            params![
                user_id,
                access_token,
                access_token_nonce,
                refresh_token,
                refresh_token_nonce,
                token_type,
                expires_at,
                payload.scope,
                email,
                now,
                now,
            ],
        )
        .context("Failed to store credentials")?;

        self.select_one(&conn, user_id)?
            .ok_or_else(|| anyhow!("Credentials for '{}' missing after upsert", user_id))
    }

    fn get(&self, user_id: &str) -> Result<Option<CredentialRecord>> {
        let conn = self.conn()?;
        self.select_one(&conn, user_id)
    }

    fn delete(&self, user_id: &str) -> Result<bool> {
        let rows_affected = self
            .conn()?
            .execute(
                "DELETE FROM linkedin_tokens WHERE user_id = ?1",
                params![user_id],
            )
            .context("Failed to delete credentials")?;

        Ok(rows_affected > 0)
    }

    fn list_all(&self) -> Result<Vec<CredentialRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(SELECT_COLUMNS)
            .context("Failed to prepare query")?;

        let rows = stmt
            .query_map([], StoredRow::from_row)
            .context("Failed to execute query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read results")?;

        rows.into_iter()
            .map(|row| row.into_record(&self.cipher))
            .collect()
    }

    fn sweep_expired(&self) -> Result<usize> {
        let now = format_timestamp(Utc::now());
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM linkedin_tokens WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![now],
            )
            .context("Failed to sweep expired credentials")?;

        Ok(removed)
    }
}
