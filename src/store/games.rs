//! Game repository.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::debug;

use crate::data::models::{Game, GameStatus, NoticeStatus};

use super::StoreError;

#[derive(Debug, FromRow)]
struct GameRow {
    game_id: String,
    start_time: DateTime<Utc>,
    home_team_id: i64,
    home_team: String,
    away_team_id: i64,
    away_team: String,
    venue: String,
    status: String,
    home_probable: Option<String>,
    away_probable: Option<String>,
    notice_status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<GameRow> for Game {
    fn from(row: GameRow) -> Self {
        Game {
            game_id: row.game_id,
            start_time: row.start_time,
            home_team_id: row.home_team_id,
            home_team: row.home_team,
            away_team_id: row.away_team_id,
            away_team: row.away_team,
            venue: row.venue,
            status: GameStatus::parse(&row.status),
            home_probable: row.home_probable,
            away_probable: row.away_probable,
            notice_status: NoticeStatus::parse(&row.notice_status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for game rows. Rows are never deleted; `notified` and
/// `skipped` notice states are terminal.
#[derive(Debug, Clone)]
pub struct GameStore {
    pool: SqlitePool,
}

impl GameStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a game by provider id.
    ///
    /// Mutable provider fields (start time, teams, venue, status) follow
    /// the latest poll; `notice_status` and `created_at` are preserved,
    /// and probables only overwrite when the new snapshot has them.
    pub async fn upsert(&self, game: &Game) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO games (game_id, start_time, home_team_id, home_team, away_team_id, \
             away_team, venue, status, home_probable, away_probable, notice_status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL) \
             ON CONFLICT(game_id) DO UPDATE SET \
                start_time = excluded.start_time, \
                home_team_id = excluded.home_team_id, \
                home_team = excluded.home_team, \
                away_team_id = excluded.away_team_id, \
                away_team = excluded.away_team, \
                venue = excluded.venue, \
                status = excluded.status, \
                home_probable = COALESCE(excluded.home_probable, games.home_probable), \
                away_probable = COALESCE(excluded.away_probable, games.away_probable), \
                updated_at = ?13",
        )
        .bind(&game.game_id)
        .bind(game.start_time)
        .bind(game.home_team_id)
        .bind(&game.home_team)
        .bind(game.away_team_id)
        .bind(&game.away_team)
        .bind(&game.venue)
        .bind(game.status.as_str())
        .bind(&game.home_probable)
        .bind(&game.away_probable)
        .bind(game.notice_status.as_str())
        .bind(game.created_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(game_id = %game.game_id, "Upserted game");
        Ok(())
    }

    pub async fn get(&self, game_id: &str) -> Result<Option<Game>, StoreError> {
        let row = sqlx::query_as::<_, GameRow>("SELECT * FROM games WHERE game_id = ?1")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Game::from))
    }

    /// Games the notification planner must look at: still pending and
    /// still scheduled according to the provider.
    pub async fn plannable(&self) -> Result<Vec<Game>, StoreError> {
        let rows = sqlx::query_as::<_, GameRow>(
            "SELECT * FROM games \
             WHERE notice_status = 'pending' AND status = 'scheduled' \
             ORDER BY start_time",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Game::from).collect())
    }

    /// Next scheduled game after `now`.
    pub async fn next_game(&self, now: DateTime<Utc>) -> Result<Option<Game>, StoreError> {
        let row = sqlx::query_as::<_, GameRow>(
            "SELECT * FROM games \
             WHERE start_time > ?1 AND status = 'scheduled' \
             ORDER BY start_time LIMIT 1",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Game::from))
    }

    /// Games currently underway or just started, within the grace window.
    /// This is the on-demand path for games whose push window was missed.
    pub async fn current_games(
        &self,
        now: DateTime<Utc>,
        grace: Duration,
    ) -> Result<Vec<Game>, StoreError> {
        let cutoff = now - grace;
        let rows = sqlx::query_as::<_, GameRow>(
            "SELECT * FROM games \
             WHERE start_time <= ?1 AND start_time >= ?2 AND status IN ('scheduled', 'live') \
             ORDER BY start_time DESC",
        )
        .bind(now)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Game::from).collect())
    }

    /// Terminal transition: confirmed delivery. Only a pending game can
    /// move; repeating the call is a no-op.
    pub async fn mark_notified(&self, game_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE games SET notice_status = 'notified', updated_at = ?2 \
             WHERE game_id = ?1 AND notice_status = 'pending'",
        )
        .bind(game_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(game_id, "Marked game notified");
        Ok(())
    }

    /// Terminal transition: push window permanently missed.
    pub async fn mark_skipped(&self, game_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE games SET notice_status = 'skipped', updated_at = ?2 \
             WHERE game_id = ?1 AND notice_status = 'pending'",
        )
        .bind(game_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(game_id, "Marked game skipped");
        Ok(())
    }

    /// Record probable pitchers fetched at notice time.
    pub async fn set_probables(
        &self,
        game_id: &str,
        home: Option<&str>,
        away: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE games SET \
                home_probable = COALESCE(?2, home_probable), \
                away_probable = COALESCE(?3, away_probable), \
                updated_at = ?4 \
             WHERE game_id = ?1",
        )
        .bind(game_id)
        .bind(home)
        .bind(away)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
