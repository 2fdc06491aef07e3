//! Async client for the MLB Stats API.
//!
//! Features:
//! - Rate limiting (configurable, default 5 req/sec)
//! - Automatic retries with exponential backoff
//! - Typed responses
//!
//! The schedule endpoint does not accept multiple game types per request,
//! so the season schedule is assembled one game type at a time. Postseason
//! rows may be missing when filtered by team, so those types are fetched
//! unfiltered and narrowed client-side.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::data::models::{Game, GameStatus, Transaction};

use super::errors::ApiError;

/// Regular season, spring training, and the postseason series types.
const GAME_TYPES: [&str; 7] = ["R", "S", "P", "D", "L", "F", "W"];

const POSTSEASON_TYPES: [&str; 5] = ["P", "D", "L", "F", "W"];

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Async REST client for the MLB Stats API.
pub struct StatsClient {
    base_url: String,
    team_id: i64,
    client: reqwest::Client,
    rate_limiter: Arc<DirectLimiter>,
    max_retries: u32,
}

impl StatsClient {
    pub fn new(
        base_url: &str,
        team_id: i64,
        rate_limit: u32,
        max_retries: u32,
        timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("mariners-bot/0.1.0")
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let quota =
            Quota::per_second(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::new(5).unwrap()));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            team_id,
            client,
            rate_limiter,
            max_retries,
        })
    }

    // =========================================================================
    // Core request method
    // =========================================================================

    async fn request(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..self.max_retries {
            // Rate limiting
            self.rate_limiter.until_ready().await;

            debug!(path, attempt = attempt + 1, "MLB API request");

            let result = self.client.get(&url).query(params).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<serde_json::Value>()
                            .await
                            .map_err(|e| ApiError::Deserialization(e.to_string()));
                    }

                    // Rate limit — always retry
                    if status.as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(1);
                        warn!(retry_after, attempt = attempt + 1, "Rate limited");
                        tokio::time::sleep(Duration::from_secs(retry_after)).await;
                        last_error = Some(ApiError::RateLimited { retry_after });
                        continue;
                    }

                    // Server errors — retry with backoff
                    if status.as_u16() >= 500 {
                        let delay_ms = 500 * 2u64.pow(attempt);
                        warn!(
                            status_code = status.as_u16(),
                            delay_ms,
                            attempt = attempt + 1,
                            "Server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        last_error = Some(ApiError::Http {
                            status_code: status.as_u16(),
                            message: status.to_string(),
                        });
                        continue;
                    }

                    // Client errors — don't retry
                    let body = response.text().await.unwrap_or_default();
                    return Err(ApiError::Http {
                        status_code: status.as_u16(),
                        message: body,
                    });
                }
                Err(e) => {
                    let delay_ms = 500 * 2u64.pow(attempt);
                    warn!(
                        error = %e,
                        delay_ms,
                        attempt = attempt + 1,
                        "Network error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                    if e.is_timeout() {
                        last_error = Some(ApiError::Timeout(e.to_string()));
                    } else {
                        last_error = Some(ApiError::Network(e.to_string()));
                    }
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::MaxRetriesExceeded {
            attempts: self.max_retries,
            last_error: "Unknown error".to_string(),
        }))
    }

    // =========================================================================
    // Schedule
    // =========================================================================

    /// Fetch the team schedule for a date range, across all game types.
    ///
    /// Duplicate gamePks across type fetches are collapsed and the result
    /// is sorted by start time. A game type whose fetch fails is skipped;
    /// the remaining types still contribute.
    pub async fn fetch_schedule(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        season: i32,
    ) -> Result<Vec<Game>, ApiError> {
        let mut by_id: std::collections::HashMap<String, Game> = std::collections::HashMap::new();

        for game_type in GAME_TYPES {
            let postseason = POSTSEASON_TYPES.contains(&game_type);

            let mut params: Vec<(&str, String)> = vec![
                ("sportId", "1".to_string()),
                ("gameType", game_type.to_string()),
                ("season", season.to_string()),
                ("startDate", start_date.format("%Y-%m-%d").to_string()),
                ("endDate", end_date.format("%Y-%m-%d").to_string()),
            ];
            if !postseason {
                params.push(("teamId", self.team_id.to_string()));
            }

            let data = match self.request("schedule", &params).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(game_type, error = %e, "Failed to fetch schedule for game type");
                    continue;
                }
            };

            let games = parse_schedule_response(&data);
            let count = games.len();
            for game in games {
                // Postseason fetches cover every team; keep only ours.
                if postseason && !game.involves_team(self.team_id) {
                    continue;
                }
                by_id.insert(game.game_id.clone(), game);
            }
            debug!(game_type, count, "Fetched games");
        }

        let mut games: Vec<Game> = by_id.into_values().collect();
        games.sort_by_key(|g| g.start_time);

        info!(total_games = games.len(), "Fetched complete schedule");
        Ok(games)
    }

    /// Fetch the latest status for a single game.
    pub async fn fetch_live_status(&self, game_id: &str) -> Result<Option<GameStatus>, ApiError> {
        let params = vec![("gamePk", game_id.to_string()), ("sportId", "1".to_string())];
        let data = self.request("schedule", &params).await?;
        Ok(parse_schedule_response(&data)
            .into_iter()
            .find(|g| g.game_id == game_id)
            .map(|g| g.status))
    }

    /// Fetch probable pitchers for a game as (home, away).
    pub async fn fetch_probable_pitchers(
        &self,
        game_id: &str,
    ) -> Result<(Option<String>, Option<String>), ApiError> {
        let params = vec![
            ("gamePk", game_id.to_string()),
            ("sportId", "1".to_string()),
            ("hydrate", "probablePitcher".to_string()),
        ];
        let data = self.request("schedule", &params).await?;

        for entry in schedule_entries(&data) {
            if entry.game_pk.to_string() == game_id {
                let home = entry.teams.home.probable_pitcher.map(|p| p.full_name);
                let away = entry.teams.away.probable_pitcher.map(|p| p.full_name);
                return Ok((home, away));
            }
        }

        warn!(game_id, "Game not found in pitcher data");
        Ok((None, None))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Fetch team transactions for a date range.
    pub async fn fetch_transactions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Transaction>, ApiError> {
        let params = vec![
            ("teamId", self.team_id.to_string()),
            ("startDate", start_date.format("%Y-%m-%d").to_string()),
            ("endDate", end_date.format("%Y-%m-%d").to_string()),
        ];

        let data = self.request("transactions", &params).await?;

        let raw = data
            .get("transactions")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        // Parse each record individually; a malformed one is skipped and
        // logged, never partially stored.
        let mut transactions = Vec::new();
        for value in raw {
            match serde_json::from_value::<TransactionEntry>(value) {
                Ok(entry) => match parse_transaction(entry) {
                    Some(tx) => transactions.push(tx),
                    None => warn!("Skipping transaction with missing fields"),
                },
                Err(e) => warn!(error = %e, "Skipping unparseable transaction"),
            }
        }

        info!(total = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }
}

// =============================================================================
// Schedule response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ScheduleResponse {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    #[serde(default)]
    games: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ScheduleGame {
    #[serde(rename = "gamePk")]
    game_pk: i64,
    #[serde(rename = "gameDate", default)]
    game_date: String,
    teams: GameTeams,
    #[serde(default)]
    venue: Option<VenueInfo>,
    #[serde(default)]
    status: Option<StatusInfo>,
}

#[derive(Debug, Deserialize)]
struct GameTeams {
    home: TeamSide,
    away: TeamSide,
}

#[derive(Debug, Deserialize)]
struct TeamSide {
    team: TeamInfo,
    #[serde(rename = "probablePitcher", default)]
    probable_pitcher: Option<PersonInfo>,
}

#[derive(Debug, Deserialize)]
struct TeamInfo {
    id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VenueInfo {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusInfo {
    #[serde(rename = "abstractGameCode", default)]
    abstract_game_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonInfo {
    #[serde(rename = "fullName")]
    full_name: String,
}

// =============================================================================
// Transactions response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TransactionEntry {
    id: i64,
    #[serde(default)]
    person: Option<PersonInfo>,
    #[serde(rename = "fromTeam", default)]
    from_team: Option<TeamInfo>,
    #[serde(rename = "toTeam", default)]
    to_team: Option<TeamInfo>,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "effectiveDate", default)]
    effective_date: Option<String>,
    #[serde(rename = "typeCode", default)]
    type_code: Option<String>,
    #[serde(rename = "typeDesc", default)]
    type_desc: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Entries of a schedule response, each parsed individually so one
/// malformed game never drops the rest of the batch.
fn schedule_entries(data: &serde_json::Value) -> Vec<ScheduleGame> {
    let response: ScheduleResponse = match serde_json::from_value(data.clone()) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Failed to parse schedule response");
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for date in response.dates {
        for value in date.games {
            match serde_json::from_value::<ScheduleGame>(value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "Skipping unparseable game"),
            }
        }
    }
    entries
}

fn parse_schedule_response(data: &serde_json::Value) -> Vec<Game> {
    let mut games = Vec::new();
    for entry in schedule_entries(data) {
        match parse_game(entry) {
            Some(game) => games.push(game),
            None => warn!("Skipping game with missing fields"),
        }
    }
    games
}

fn parse_game(entry: ScheduleGame) -> Option<Game> {
    let start_time = DateTime::parse_from_rfc3339(&entry.game_date)
        .ok()?
        .with_timezone(&Utc);

    let status = entry
        .status
        .and_then(|s| s.abstract_game_code)
        .map(|code| GameStatus::from_abstract_code(&code))
        .unwrap_or(GameStatus::Scheduled);

    Some(Game::new(
        entry.game_pk.to_string(),
        start_time,
        entry.teams.home.team.id,
        entry.teams.home.team.name,
        entry.teams.away.team.id,
        entry.teams.away.team.name,
        entry
            .venue
            .and_then(|v| v.name)
            .unwrap_or_else(|| "Unknown Venue".to_string()),
        status,
    ))
}

fn parse_transaction(entry: TransactionEntry) -> Option<Transaction> {
    let person = entry.person?;
    let date = NaiveDate::parse_from_str(entry.date.as_deref()?, "%Y-%m-%d").ok()?;
    let effective_date = entry
        .effective_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Some(Transaction::new(
        entry.id,
        person.full_name,
        entry.from_team.as_ref().map(|t| t.id),
        entry.from_team.map(|t| t.name),
        entry.to_team.as_ref().map(|t| t.id),
        entry.to_team.map(|t| t.name),
        date,
        effective_date,
        entry.type_code?,
        entry.type_desc.unwrap_or_default(),
        entry.description?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_schedule_game() {
        let data = json!({
            "dates": [{
                "games": [{
                    "gamePk": 745804,
                    "gameDate": "2024-07-01T19:10:00Z",
                    "teams": {
                        "home": {"team": {"id": 136, "name": "Seattle Mariners"}},
                        "away": {"team": {"id": 110, "name": "Baltimore Orioles"}}
                    },
                    "venue": {"name": "T-Mobile Park"},
                    "status": {"abstractGameCode": "P"}
                }]
            }]
        });

        let games = parse_schedule_response(&data);
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.game_id, "745804");
        assert_eq!(game.home_team, "Seattle Mariners");
        assert_eq!(game.venue, "T-Mobile Park");
        // Pre-game ("P") still counts as scheduled.
        assert_eq!(game.status, GameStatus::Scheduled);
        assert!(game.involves_team(136));
        assert!(!game.involves_team(147));
    }

    #[test]
    fn skips_game_without_date() {
        let data = json!({
            "dates": [{
                "games": [{
                    "gamePk": 1,
                    "teams": {
                        "home": {"team": {"id": 136, "name": "Seattle Mariners"}},
                        "away": {"team": {"id": 110, "name": "Baltimore Orioles"}}
                    }
                }]
            }]
        });

        assert!(parse_schedule_response(&data).is_empty());
    }

    #[test]
    fn parses_transaction_entry() {
        let entry: TransactionEntry = serde_json::from_value(json!({
            "id": 488861,
            "person": {"fullName": "Randy Arozarena"},
            "toTeam": {"id": 136, "name": "Seattle Mariners"},
            "fromTeam": {"id": 139, "name": "Tampa Bay Rays"},
            "date": "2024-07-25",
            "typeCode": "TR",
            "typeDesc": "Trade",
            "description": "Tampa Bay Rays traded LF Randy Arozarena to Seattle Mariners."
        }))
        .unwrap();

        let tx = parse_transaction(entry).unwrap();
        assert_eq!(tx.transaction_id, 488861);
        assert_eq!(tx.to_team_id, Some(136));
        assert_eq!(tx.transaction_date, NaiveDate::from_ymd_opt(2024, 7, 25).unwrap());
    }

    #[test]
    fn rejects_transaction_without_description() {
        let entry: TransactionEntry = serde_json::from_value(json!({
            "id": 1,
            "person": {"fullName": "Somebody"},
            "date": "2024-07-25",
            "typeCode": "TR"
        }))
        .unwrap();

        assert!(parse_transaction(entry).is_none());
    }
}
