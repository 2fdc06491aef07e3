//! User repository.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::{debug, warn};

use crate::data::models::{TransactionKind, User};

use super::StoreError;

#[derive(Debug, FromRow)]
struct UserRow {
    chat_id: i64,
    username: Option<String>,
    first_name: Option<String>,
    subscribed: bool,
    enabled_kinds: String,
    major_league_only: bool,
    created_at: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_user(self) -> User {
        let enabled_kinds: BTreeSet<TransactionKind> =
            match serde_json::from_str(&self.enabled_kinds) {
                Ok(kinds) => kinds,
                Err(e) => {
                    warn!(chat_id = self.chat_id, error = %e, "Unreadable preference set, using defaults");
                    TransactionKind::all().into_iter().collect()
                }
            };

        User {
            chat_id: self.chat_id,
            username: self.username,
            first_name: self.first_name,
            subscribed: self.subscribed,
            enabled_kinds,
            major_league_only: self.major_league_only,
            created_at: self.created_at,
            last_seen: self.last_seen,
        }
    }
}

fn kinds_json(kinds: &BTreeSet<TransactionKind>) -> Result<String, StoreError> {
    serde_json::to_string(kinds).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a user, creating the default record on first contact.
    /// Contact details and last-seen refresh on every call; preference
    /// fields are never touched here.
    pub async fn ensure(
        &self,
        chat_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let defaults = User::new(chat_id, None, None);
        sqlx::query(
            "INSERT INTO users (chat_id, username, first_name, subscribed, enabled_kinds, \
             major_league_only, created_at, last_seen) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(chat_id) DO UPDATE SET \
                username = excluded.username, \
                first_name = excluded.first_name, \
                last_seen = excluded.last_seen",
        )
        .bind(chat_id)
        .bind(username)
        .bind(first_name)
        .bind(defaults.subscribed)
        .bind(kinds_json(&defaults.enabled_kinds)?)
        .bind(defaults.major_league_only)
        .bind(defaults.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.get(chat_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("user {chat_id} vanished after upsert")))
    }

    pub async fn get(&self, chat_id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE chat_id = ?1")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(UserRow::into_user))
    }

    pub async fn subscribed(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE subscribed = 1")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    pub async fn set_subscribed(&self, chat_id: i64, subscribed: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET subscribed = ?2 WHERE chat_id = ?1")
            .bind(chat_id)
            .bind(subscribed)
            .execute(&self.pool)
            .await?;

        debug!(chat_id, subscribed, "Updated subscription");
        Ok(())
    }

    /// Flip one transaction kind for a user; returns the new enabled state.
    pub async fn toggle_kind(
        &self,
        chat_id: i64,
        kind: TransactionKind,
    ) -> Result<bool, StoreError> {
        let user = self
            .get(chat_id)
            .await?
            .unwrap_or_else(|| User::new(chat_id, None, None));

        let mut kinds = user.enabled_kinds;
        let enabled = if kinds.contains(&kind) {
            kinds.remove(&kind);
            false
        } else {
            kinds.insert(kind);
            true
        };

        sqlx::query("UPDATE users SET enabled_kinds = ?2 WHERE chat_id = ?1")
            .bind(chat_id)
            .bind(kinds_json(&kinds)?)
            .execute(&self.pool)
            .await?;

        debug!(chat_id, kind = kind.tag(), enabled, "Toggled transaction kind");
        Ok(enabled)
    }

    pub async fn set_major_league_only(
        &self,
        chat_id: i64,
        major_league_only: bool,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET major_league_only = ?2 WHERE chat_id = ?1")
            .bind(chat_id)
            .bind(major_league_only)
            .execute(&self.pool)
            .await?;

        debug!(chat_id, major_league_only, "Updated major-league filter");
        Ok(())
    }
}
