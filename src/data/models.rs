//! Core domain models: games, transactions, users.
//!
//! These types provide type safety and serialization for API responses,
//! persistence rows, and message rendering.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Game
// =============================================================================

/// Game status derived from the provider's abstract game codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
    Postponed,
    Cancelled,
}

impl GameStatus {
    /// Map the provider's abstract game code to a status.
    /// "P" here is Pre-Game, which still counts as scheduled.
    pub fn from_abstract_code(code: &str) -> Self {
        match code {
            "S" | "P" => Self::Scheduled,
            "L" => Self::Live,
            "F" => Self::Final,
            "D" => Self::Postponed,
            "C" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Live => "live",
            Self::Final => "final",
            Self::Postponed => "postponed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "live" => Self::Live,
            "final" => Self::Final,
            "postponed" => Self::Postponed,
            "cancelled" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }
}

/// Where a game sits in the notification lifecycle. `Notified` and
/// `Skipped` are terminal: the planner never looks at those rows again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeStatus {
    Pending,
    Notified,
    Skipped,
}

impl NoticeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Notified => "notified",
            Self::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "notified" => Self::Notified,
            "skipped" => Self::Skipped,
            _ => Self::Pending,
        }
    }
}

/// A single game as known from the latest schedule poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub game_id: String,
    pub start_time: DateTime<Utc>,
    pub home_team_id: i64,
    pub home_team: String,
    pub away_team_id: i64,
    pub away_team: String,
    pub venue: String,
    pub status: GameStatus,
    pub home_probable: Option<String>,
    pub away_probable: Option<String>,
    pub notice_status: NoticeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Game {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        game_id: String,
        start_time: DateTime<Utc>,
        home_team_id: i64,
        home_team: String,
        away_team_id: i64,
        away_team: String,
        venue: String,
        status: GameStatus,
    ) -> Self {
        Self {
            game_id,
            start_time,
            home_team_id,
            home_team,
            away_team_id,
            away_team,
            venue,
            status,
            home_probable: None,
            away_probable: None,
            notice_status: NoticeStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn involves_team(&self, team_id: i64) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    pub fn is_team_home(&self, team_id: i64) -> bool {
        self.home_team_id == team_id
    }

    /// The opposing team's name, from our team's perspective.
    pub fn opponent(&self, team_id: i64) -> &str {
        if self.is_team_home(team_id) {
            &self.away_team
        } else {
            &self.home_team
        }
    }

    /// Link to the provider's game detail page.
    pub fn gameday_url(&self) -> String {
        format!("https://www.mlb.com/gameday/{}", self.game_id)
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Transaction classification buckets used for user preferences.
///
/// Provider type codes collapse into these; anything unrecognized lands in
/// `Other`, which defaults to enabled so new provider codes still surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Trade,
    Signing,
    Recall,
    Optioned,
    InjuredList,
    Activation,
    Release,
    StatusChange,
    Other,
}

impl TransactionKind {
    pub fn from_type_code(code: &str) -> Self {
        match code {
            "TR" => Self::Trade,
            "SFA" | "PUR" | "CLA" => Self::Signing,
            "REC" | "SEL" => Self::Recall,
            "OPT" => Self::Optioned,
            "IL" => Self::InjuredList,
            "ACT" | "REI" => Self::Activation,
            "REL" => Self::Release,
            "SC" | "DES" | "SUS" => Self::StatusChange,
            _ => Self::Other,
        }
    }

    pub fn all() -> [Self; 9] {
        [
            Self::Trade,
            Self::Signing,
            Self::Recall,
            Self::Optioned,
            Self::InjuredList,
            Self::Activation,
            Self::Release,
            Self::StatusChange,
            Self::Other,
        ]
    }

    /// Stable tag used in storage and the /toggle command.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Trade => "trades",
            Self::Signing => "signings",
            Self::Recall => "recalls",
            Self::Optioned => "options",
            Self::InjuredList => "injuries",
            Self::Activation => "activations",
            Self::Release => "releases",
            Self::StatusChange => "status_changes",
            Self::Other => "other",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "trades" | "trade" => Some(Self::Trade),
            "signings" | "signing" => Some(Self::Signing),
            "recalls" | "recall" => Some(Self::Recall),
            "options" | "option" | "optioned" => Some(Self::Optioned),
            "injuries" | "injury" | "il" => Some(Self::InjuredList),
            "activations" | "activation" => Some(Self::Activation),
            "releases" | "release" => Some(Self::Release),
            "status_changes" | "status" => Some(Self::StatusChange),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Trade => "Trades",
            Self::Signing => "Signings",
            Self::Recall => "Recalls",
            Self::Optioned => "Options",
            Self::InjuredList => "Injuries",
            Self::Activation => "Activations",
            Self::Release => "Releases",
            Self::StatusChange => "Status Changes",
            Self::Other => "Other",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Trade => "🔄",
            Self::Signing => "✍️",
            Self::Recall => "📞",
            Self::Optioned => "⬇️",
            Self::InjuredList => "🏥",
            Self::Activation => "✅",
            Self::Release => "🚪",
            Self::StatusChange => "📋",
            Self::Other => "📝",
        }
    }
}

/// Terms that mark a transaction as a minor-league move.
const MINOR_LEAGUE_TERMS: [&str; 5] =
    ["minor league", "triple-a", "double-a", "single-a", "rookie"];

/// A roster transaction as reported by the provider. Immutable after
/// first sighting; presence in the store doubles as the seen-set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: i64,
    pub person_name: String,
    pub from_team_id: Option<i64>,
    pub from_team: Option<String>,
    pub to_team_id: Option<i64>,
    pub to_team: Option<String>,
    pub transaction_date: NaiveDate,
    pub effective_date: Option<NaiveDate>,
    pub type_code: String,
    pub type_description: String,
    pub description: String,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: i64,
        person_name: String,
        from_team_id: Option<i64>,
        from_team: Option<String>,
        to_team_id: Option<i64>,
        to_team: Option<String>,
        transaction_date: NaiveDate,
        effective_date: Option<NaiveDate>,
        type_code: String,
        type_description: String,
        description: String,
    ) -> Self {
        Self {
            transaction_id,
            person_name,
            from_team_id,
            from_team,
            to_team_id,
            to_team,
            transaction_date,
            effective_date,
            type_code,
            type_description,
            description,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        TransactionKind::from_type_code(&self.type_code)
    }

    pub fn is_minor_league(&self) -> bool {
        let description = self.description.to_lowercase();
        MINOR_LEAGUE_TERMS.iter().any(|term| description.contains(term))
    }

    pub fn involves_team(&self, team_id: i64) -> bool {
        self.from_team_id == Some(team_id) || self.to_team_id == Some(team_id)
    }

    pub fn is_acquisition(&self, team_id: i64) -> bool {
        self.to_team_id == Some(team_id)
    }

    pub fn is_departure(&self, team_id: i64) -> bool {
        self.from_team_id == Some(team_id)
    }
}

// =============================================================================
// Users
// =============================================================================

/// A chat user and their notification preferences.
///
/// Preferences are a set of enabled transaction kinds plus one
/// major-league-only filter; delivery is a set-intersection test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub subscribed: bool,
    pub enabled_kinds: BTreeSet<TransactionKind>,
    pub major_league_only: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    /// Default state on first contact: subscribed, all kinds on,
    /// major-league-only off.
    pub fn new(chat_id: i64, username: Option<String>, first_name: Option<String>) -> Self {
        Self {
            chat_id,
            username,
            first_name,
            subscribed: true,
            enabled_kinds: TransactionKind::all().into_iter().collect(),
            major_league_only: false,
            created_at: Utc::now(),
            last_seen: None,
        }
    }

    /// Whether this user wants a given transaction delivered.
    pub fn wants(&self, transaction: &Transaction) -> bool {
        if self.major_league_only && transaction.is_minor_league() {
            return false;
        }
        self.enabled_kinds.contains(&transaction.kind())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_transaction(type_code: &str, description: &str) -> Transaction {
        Transaction::new(
            1,
            "Julio Rodríguez".to_string(),
            None,
            None,
            Some(136),
            Some("Seattle Mariners".to_string()),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            None,
            type_code.to_string(),
            "desc".to_string(),
            description.to_string(),
        )
    }

    #[test]
    fn type_codes_collapse_into_kinds() {
        assert_eq!(TransactionKind::from_type_code("TR"), TransactionKind::Trade);
        assert_eq!(TransactionKind::from_type_code("SFA"), TransactionKind::Signing);
        assert_eq!(TransactionKind::from_type_code("CLA"), TransactionKind::Signing);
        assert_eq!(TransactionKind::from_type_code("SEL"), TransactionKind::Recall);
        assert_eq!(TransactionKind::from_type_code("IL"), TransactionKind::InjuredList);
        assert_eq!(TransactionKind::from_type_code("REI"), TransactionKind::Activation);
        // Unknown codes land in the default-on Other bucket.
        assert_eq!(TransactionKind::from_type_code("XYZ"), TransactionKind::Other);
    }

    #[test]
    fn tag_round_trip() {
        for kind in TransactionKind::all() {
            assert_eq!(TransactionKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(TransactionKind::from_tag("Trades"), Some(TransactionKind::Trade));
        assert_eq!(TransactionKind::from_tag("nonsense"), None);
    }

    #[test]
    fn minor_league_detection() {
        let tx = make_transaction("OPT", "Seattle Mariners optioned RHP X to Triple-A Tacoma.");
        assert!(tx.is_minor_league());

        let tx = make_transaction("TR", "Rays traded LF Randy Arozarena to Seattle Mariners.");
        assert!(!tx.is_minor_league());
    }

    #[test]
    fn default_user_wants_everything_major_or_minor() {
        let user = User::new(42, None, None);
        assert!(user.subscribed);
        assert!(!user.major_league_only);

        let minor = make_transaction("OPT", "optioned to Triple-A Tacoma");
        assert!(user.wants(&minor));
    }

    #[test]
    fn major_league_only_filters_minor_moves() {
        let mut user = User::new(42, None, None);
        user.major_league_only = true;

        let minor = make_transaction("OPT", "optioned to Triple-A Tacoma");
        assert!(!user.wants(&minor));

        let major = make_transaction("TR", "traded to Seattle Mariners");
        assert!(user.wants(&major));
    }

    #[test]
    fn disabled_kind_is_filtered() {
        let mut user = User::new(42, None, None);
        user.enabled_kinds.remove(&TransactionKind::Other);

        let unknown = make_transaction("NEWCODE", "something new");
        assert!(!user.wants(&unknown));
    }

    #[test]
    fn game_status_codes() {
        assert_eq!(GameStatus::from_abstract_code("S"), GameStatus::Scheduled);
        assert_eq!(GameStatus::from_abstract_code("P"), GameStatus::Scheduled);
        assert_eq!(GameStatus::from_abstract_code("L"), GameStatus::Live);
        assert_eq!(GameStatus::from_abstract_code("F"), GameStatus::Final);
        assert_eq!(GameStatus::from_abstract_code("D"), GameStatus::Postponed);
        assert_eq!(GameStatus::from_abstract_code("C"), GameStatus::Cancelled);
    }

    #[test]
    fn opponent_and_home_detection() {
        let game = Game::new(
            "745804".to_string(),
            Utc::now(),
            136,
            "Seattle Mariners".to_string(),
            110,
            "Baltimore Orioles".to_string(),
            "T-Mobile Park".to_string(),
            GameStatus::Scheduled,
        );
        assert!(game.is_team_home(136));
        assert_eq!(game.opponent(136), "Baltimore Orioles");
        assert_eq!(game.gameday_url(), "https://www.mlb.com/gameday/745804");
    }
}
