//! SQLite persistence layer.
//!
//! One pool, one repository struct per aggregate. Every write is a single
//! statement keyed by a stable identifier, so interleaved poll cycles
//! converge without explicit locking.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

pub mod games;
pub mod transactions;
pub mod users;

pub use games::GameStore;
pub use transactions::TransactionStore;
pub use users::UserStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS games (
    game_id        TEXT PRIMARY KEY,
    start_time     TEXT NOT NULL,
    home_team_id   INTEGER NOT NULL,
    home_team      TEXT NOT NULL,
    away_team_id   INTEGER NOT NULL,
    away_team      TEXT NOT NULL,
    venue          TEXT NOT NULL,
    status         TEXT NOT NULL,
    home_probable  TEXT,
    away_probable  TEXT,
    notice_status  TEXT NOT NULL DEFAULT 'pending',
    created_at     TEXT NOT NULL,
    updated_at     TEXT
);

CREATE INDEX IF NOT EXISTS idx_games_planning
    ON games (notice_status, status, start_time);

CREATE TABLE IF NOT EXISTS transactions (
    transaction_id   INTEGER PRIMARY KEY,
    person_name      TEXT NOT NULL,
    from_team_id     INTEGER,
    from_team        TEXT,
    to_team_id       INTEGER,
    to_team          TEXT,
    transaction_date TEXT NOT NULL,
    effective_date   TEXT,
    type_code        TEXT NOT NULL,
    type_description TEXT NOT NULL,
    description      TEXT NOT NULL,
    first_seen_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_date
    ON transactions (transaction_date);

CREATE TABLE IF NOT EXISTS users (
    chat_id           INTEGER PRIMARY KEY,
    username          TEXT,
    first_name        TEXT,
    subscribed        INTEGER NOT NULL DEFAULT 1,
    enabled_kinds     TEXT NOT NULL,
    major_league_only INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    last_seen         TEXT
);
";

/// Durable state: games, the transaction seen-set, and users.
#[derive(Debug, Clone)]
pub struct Store {
    pub games: GameStore,
    pub transactions: TransactionStore,
    pub users: UserStore,
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Single-writer database: one long-lived connection. This also
        // keeps in-memory databases intact, which would otherwise be
        // per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self {
            games: GameStore::new(pool.clone()),
            transactions: TransactionStore::new(pool.clone()),
            users: UserStore::new(pool.clone()),
            pool,
        };
        store.migrate().await?;

        info!(database_url, "Store initialized");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
