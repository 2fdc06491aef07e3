//! HTML message rendering for Telegram delivery.
//!
//! Rendering is pure: every function takes snapshots and returns a string,
//! so the sync cycles and tests can build messages without a transport.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::data::models::{Game, Transaction, User};

/// Format an instant in the configured display timezone, e.g. "7:05 PM PT".
pub fn format_local_time(instant: DateTime<Utc>, offset_hours: i32, label: &str) -> String {
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let local = instant.with_timezone(&offset);
    format!("{} {}", local.format("%-I:%M %p"), label)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

// =============================================================================
// Game notices
// =============================================================================

/// Pre-game push notification.
pub fn render_game_notice(
    game: &Game,
    team_id: i64,
    lead_minutes: i64,
    offset_hours: i32,
    tz_label: &str,
) -> String {
    let is_home = game.is_team_home(team_id);
    let team = if is_home { &game.home_team } else { &game.away_team };
    let opponent = game.opponent(team_id);

    let location_emoji = if is_home { "🏠" } else { "✈️" };
    let location_text = if is_home { "at home" } else { "away" };

    let (our_pitcher, their_pitcher) = if is_home {
        (&game.home_probable, &game.away_probable)
    } else {
        (&game.away_probable, &game.home_probable)
    };
    let pitcher_info = match (our_pitcher, their_pitcher) {
        (Some(ours), Some(theirs)) => format!("🥎 <b>Pitching:</b> {ours} vs {theirs}\n"),
        (Some(ours), None) => format!("🥎 <b>Probable Pitcher:</b> {ours}\n"),
        _ => String::new(),
    };

    let time_str = format_local_time(game.start_time, offset_hours, tz_label);

    format!(
        "🔥 <b>{team} Game Starting Soon!</b>\n\
         ⚾ {team} vs {opponent}\n\
         🏟️ {venue}\n\
         📍 Playing {location_text} {location_emoji}\n\
         {pitcher_info}\
         🕐 Starts in {lead_minutes} minutes ({time_str})\n\
         📺 <a href=\"{url}\">Watch live on MLB Gameday</a>",
        venue = game.venue,
        url = game.gameday_url(),
    )
}

/// On-demand next-game card for the /nextgame command.
pub fn render_next_game(
    game: &Game,
    team_id: i64,
    offset_hours: i32,
    tz_label: &str,
) -> String {
    let is_home = game.is_team_home(team_id);
    let location = if is_home { "🏠 home" } else { "✈️ away" };
    let offset = FixedOffset::east_opt(offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let local = game.start_time.with_timezone(&offset);

    format!(
        "⚾ <b>Next game:</b> {away} @ {home}\n\
         🏟️ {venue} ({location})\n\
         🕐 {date} at {time} {tz_label}\n\
         📺 <a href=\"{url}\">MLB Gameday</a>",
        away = game.away_team,
        home = game.home_team,
        venue = game.venue,
        date = local.format("%A, %B %-d"),
        time = local.format("%-I:%M %p"),
        url = game.gameday_url(),
    )
}

// =============================================================================
// Transactions
// =============================================================================

fn direction_marker(tx: &Transaction, team_id: i64) -> &'static str {
    if tx.is_acquisition(team_id) {
        "➡️"
    } else if tx.is_departure(team_id) {
        "⬅️"
    } else {
        ""
    }
}

/// Detailed card for a single transaction.
pub fn render_transaction(tx: &Transaction, team_id: i64) -> String {
    let kind = tx.kind();
    let direction = direction_marker(tx, team_id);

    let type_label = tx.type_description.to_uppercase();
    let title = format!("{} <b>{}</b> {}", kind.emoji(), type_label, direction);

    let mut message = format!(
        "{title}\n\n\
         👤 <b>Player:</b> {player}\n\
         📋 <b>Transaction:</b> {description}\n\
         📅 <b>Date:</b> {date}\n",
        title = title.trim_end(),
        player = tx.person_name,
        description = tx.description,
        date = format_date(tx.transaction_date),
    );

    if let Some(effective) = tx.effective_date {
        if effective != tx.transaction_date {
            message.push_str(&format!("⏰ <b>Effective:</b> {}\n", format_date(effective)));
        }
    }

    message
}

/// One outbound message for a whole poll cycle's worth of new
/// transactions. A single record gets the detailed card; multiple records
/// get a summary header plus a numbered detail list.
pub fn render_transaction_batch(transactions: &[Transaction], team_id: i64) -> Option<String> {
    match transactions {
        [] => None,
        [only] => Some(render_transaction(only, team_id)),
        _ => Some(render_batch(transactions, team_id)),
    }
}

fn render_batch(transactions: &[Transaction], team_id: i64) -> String {
    // Per-type counts for the summary line.
    let mut type_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tx in transactions {
        *type_counts.entry(tx.type_description.as_str()).or_default() += 1;
    }
    let summary = type_counts
        .iter()
        .map(|(label, count)| {
            if *count == 1 {
                (*label).to_string()
            } else {
                format!("{count} {label}s")
            }
        })
        .collect::<Vec<_>>()
        .join(" • ");

    let min_date = transactions.iter().map(|t| t.transaction_date).min();
    let max_date = transactions.iter().map(|t| t.transaction_date).max();
    let date_range = match (min_date, max_date) {
        (Some(min), Some(max)) if min == max => format_date(min),
        (Some(min), Some(max)) => {
            format!("{} - {}", min.format("%B %-d"), format_date(max))
        }
        _ => String::new(),
    };

    let mut message = format!(
        "🔥 <b>ROSTER TRANSACTION UPDATE</b>\n\n\
         📋 <b>Summary:</b> {summary}\n\
         📅 <b>Date:</b> {date_range}\n\n\
         <b>Details:</b>\n"
    );

    for (i, tx) in transactions.iter().enumerate() {
        let direction = direction_marker(tx, team_id);
        message.push_str(&format!(
            "\n{n}. {emoji} <b>{player}</b> {direction}\n   {description}\n",
            n = i + 1,
            emoji = tx.kind().emoji(),
            player = tx.person_name,
            description = tx.description,
        ));
        if let Some(effective) = tx.effective_date {
            if effective != tx.transaction_date {
                message.push_str(&format!(
                    "   <i>Effective: {}</i>\n",
                    format_date(effective)
                ));
            }
        }
    }

    message
}

// =============================================================================
// Preferences
// =============================================================================

/// Human summary of a user's transaction preferences.
pub fn render_preferences(user: &User) -> String {
    let enabled: Vec<&str> = user.enabled_kinds.iter().map(|k| k.label()).collect();

    let mut summary = if enabled.is_empty() {
        "No transaction notifications enabled".to_string()
    } else {
        format!("Notifications enabled for: {}", enabled.join(", "))
    };

    if user.major_league_only {
        summary.push_str(" (Major League only)");
    } else {
        summary.push_str(" (All levels)");
    }

    summary
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::GameStatus;
    use chrono::TimeZone;

    fn make_game() -> Game {
        let mut game = Game::new(
            "745804".to_string(),
            Utc.with_ymd_and_hms(2024, 7, 1, 19, 10, 0).unwrap(),
            136,
            "Seattle Mariners".to_string(),
            110,
            "Baltimore Orioles".to_string(),
            "T-Mobile Park".to_string(),
            GameStatus::Scheduled,
        );
        game.home_probable = Some("Logan Gilbert".to_string());
        game.away_probable = Some("Corbin Burnes".to_string());
        game
    }

    fn make_tx(id: i64, type_code: &str, type_desc: &str, date: (i32, u32, u32)) -> Transaction {
        Transaction::new(
            id,
            format!("Player {id}"),
            None,
            None,
            Some(136),
            Some("Seattle Mariners".to_string()),
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            None,
            type_code.to_string(),
            type_desc.to_string(),
            format!("Description {id}"),
        )
    }

    #[test]
    fn local_time_formatting() {
        // 19:10 UTC at -7 is 12:10 PM.
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 19, 10, 0).unwrap();
        assert_eq!(format_local_time(instant, -7, "PT"), "12:10 PM PT");
    }

    #[test]
    fn game_notice_contains_matchup_and_pitchers() {
        let message = render_game_notice(&make_game(), 136, 5, -7, "PT");
        assert!(message.contains("Seattle Mariners Game Starting Soon!"));
        assert!(message.contains("vs Baltimore Orioles"));
        assert!(message.contains("T-Mobile Park"));
        assert!(message.contains("at home 🏠"));
        // Home team's pitcher listed first: ours vs theirs.
        assert!(message.contains("Logan Gilbert vs Corbin Burnes"));
        assert!(message.contains("Starts in 5 minutes"));
        assert!(message.contains("https://www.mlb.com/gameday/745804"));
    }

    #[test]
    fn away_game_notice_flips_perspective() {
        let mut game = make_game();
        game.home_team_id = 110;
        game.home_team = "Baltimore Orioles".to_string();
        game.away_team_id = 136;
        game.away_team = "Seattle Mariners".to_string();

        let message = render_game_notice(&game, 136, 5, -7, "PT");
        assert!(message.contains("away ✈️"));
        // Away perspective: our pitcher is the away probable.
        assert!(message.contains("Corbin Burnes vs Logan Gilbert"));
    }

    #[test]
    fn empty_batch_renders_nothing() {
        assert!(render_transaction_batch(&[], 136).is_none());
    }

    #[test]
    fn single_transaction_renders_detailed_card() {
        let tx = make_tx(1, "TR", "Trade", (2024, 7, 25));
        let message = render_transaction_batch(std::slice::from_ref(&tx), 136).unwrap();
        assert!(message.contains("🔄 <b>TRADE</b> ➡️"));
        assert!(message.contains("Player 1"));
        assert!(message.contains("July 25, 2024"));
        assert!(!message.contains("Summary:"));
    }

    #[test]
    fn batch_renders_summary_and_numbered_details() {
        let batch = vec![
            make_tx(1, "TR", "Trade", (2024, 7, 24)),
            make_tx(2, "TR", "Trade", (2024, 7, 25)),
            make_tx(3, "SFA", "Signed as Free Agent", (2024, 7, 25)),
        ];
        let message = render_transaction_batch(&batch, 136).unwrap();
        assert!(message.contains("ROSTER TRANSACTION UPDATE"));
        assert!(message.contains("Signed as Free Agent • 2 Trades"));
        assert!(message.contains("July 24 - July 25, 2024"));
        assert!(message.contains("\n1. "));
        assert!(message.contains("\n3. "));
    }

    #[test]
    fn preference_summary() {
        let mut user = User::new(42, None, None);
        let summary = render_preferences(&user);
        assert!(summary.contains("Trades"));
        assert!(summary.contains("All levels"));

        user.major_league_only = true;
        user.enabled_kinds.clear();
        let summary = render_preferences(&user);
        assert!(summary.contains("No transaction notifications enabled"));
        assert!(summary.contains("Major League only"));
    }
}
