//! Notification planner.
//!
//! Pure decision logic: given the plannable games and the current
//! wall-clock instant, decide which notice jobs must exist. Applying the
//! result against the scheduler is idempotent, so the planner can run on
//! every schedule sync and on every startup.

use chrono::{DateTime, Duration, Utc};

use crate::data::models::{Game, GameStatus, NoticeStatus};

/// Derived job identity for a game's notice. Re-deriving for the same
/// game always yields the same key, which is what makes rescheduling
/// replace instead of duplicate.
pub fn job_key(game_id: &str) -> String {
    format!("game:{game_id}")
}

/// What must happen for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// A pending job keyed `game:<id>` must exist with this fire instant.
    /// An existing job with a different fire instant is superseded.
    Schedule { fire_at: DateTime<Utc> },
    /// The lead window has already opened but the game has not started:
    /// no push, the game is only surfaced by on-demand queries.
    InWindow,
    /// The game already started without a notice: permanently skipped.
    Skip,
}

#[derive(Debug, Clone)]
pub struct GamePlan {
    pub game_id: String,
    pub action: PlanAction,
}

/// Plan notices for every game still eligible for one.
///
/// Games that are already notified/skipped or no longer scheduled produce
/// no entry; the store query usually filters those, but the rule is part
/// of the planner's contract.
pub fn plan(games: &[Game], now: DateTime<Utc>, lead: Duration) -> Vec<GamePlan> {
    games
        .iter()
        .filter(|g| g.notice_status == NoticeStatus::Pending && g.status == GameStatus::Scheduled)
        .map(|game| GamePlan {
            game_id: game.game_id.clone(),
            action: plan_one(game, now, lead),
        })
        .collect()
}

fn plan_one(game: &Game, now: DateTime<Utc>, lead: Duration) -> PlanAction {
    let due = game.start_time - lead;

    if due > now {
        PlanAction::Schedule { fire_at: due }
    } else if game.start_time > now {
        PlanAction::InWindow
    } else {
        PlanAction::Skip
    }
}
