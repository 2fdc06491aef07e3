//! Scenario tests for notification timing and transaction dedup.
//!
//! Every scenario carries its hand-computed expectation in a comment so a
//! timing regression is caught before it pings anyone at the wrong time.
//!
//! Modules under test:
//!   1. Notification planner        (src/planner/plan.rs)
//!   2. Replace-on-conflict wrapper (src/scheduler/mod.rs)
//!   3. Transaction deduplicator    (src/planner/dedup.rs)
//!   4. Message rendering           (src/data/messages.rs)

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use mariners_bot::data::messages::render_transaction_batch;
use mariners_bot::data::models::{Game, GameStatus, Transaction, TransactionKind, User};
use mariners_bot::planner::dedup::{partition_new, select_for_user};
use mariners_bot::planner::plan::{job_key, plan, PlanAction};
use mariners_bot::scheduler::{NoticeScheduler, ScheduleOutcome, Task};

// =============================================================================
// Helpers
// =============================================================================

const MARINERS: i64 = 136;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, h, m, s).unwrap()
}

fn make_game(game_id: &str, start_time: DateTime<Utc>) -> Game {
    Game::new(
        game_id.to_string(),
        start_time,
        MARINERS,
        "Seattle Mariners".to_string(),
        110,
        "Baltimore Orioles".to_string(),
        "T-Mobile Park".to_string(),
        GameStatus::Scheduled,
    )
}

fn make_tx(id: i64, type_code: &str, date: NaiveDate) -> Transaction {
    Transaction::new(
        id,
        format!("Player {id}"),
        None,
        None,
        Some(MARINERS),
        Some("Seattle Mariners".to_string()),
        date,
        None,
        type_code.to_string(),
        type_code.to_string(),
        format!("Move number {id}"),
    )
}

fn noop_task() -> Task {
    Arc::new(|| Box::pin(async {}))
}

// =============================================================================
// Planner timing scenarios
// =============================================================================

#[test]
fn g1_gets_a_job_five_minutes_before_start() {
    // start 19:10:00Z, now 19:03:00Z -> due 19:05:00Z.
    let games = vec![make_game("g1", at(19, 10, 0))];
    let plans = plan(&games, at(19, 3, 0), Duration::minutes(5));

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].game_id, "g1");
    assert_eq!(plans[0].action, PlanAction::Schedule { fire_at: at(19, 5, 0) });
}

#[test]
fn in_window_game_is_never_pushed_but_is_not_terminal() {
    // due 19:05 <= now 19:06 < start 19:10: on-demand only, no state change.
    let games = vec![make_game("g1", at(19, 10, 0))];
    let plans = plan(&games, at(19, 6, 0), Duration::minutes(5));
    assert_eq!(plans[0].action, PlanAction::InWindow);
}

#[test]
fn restart_after_start_skips_the_game_permanently() {
    // Restart at 19:10:05Z; start 19:10:00Z already passed -> Skip.
    let games = vec![make_game("g1", at(19, 10, 0))];
    let plans = plan(&games, at(19, 10, 5), Duration::minutes(5));
    assert_eq!(plans[0].action, PlanAction::Skip);
}

// =============================================================================
// Planner + scheduler reconciliation
// =============================================================================

#[tokio::test]
async fn planning_twice_with_unchanged_start_yields_one_pending_job() {
    let scheduler = NoticeScheduler::new().await.unwrap();
    let games = vec![make_game("g1", Utc::now() + Duration::hours(3))];
    let lead = Duration::minutes(5);

    for _ in 0..2 {
        for game_plan in plan(&games, Utc::now(), lead) {
            if let PlanAction::Schedule { fire_at } = game_plan.action {
                scheduler
                    .schedule_replace(&job_key(&game_plan.game_id), fire_at, noop_task())
                    .await
                    .unwrap();
            }
        }
    }

    assert_eq!(scheduler.pending_count().await, 1);
}

#[tokio::test]
async fn postponement_supersedes_the_original_fire_time() {
    // g1 planned at due 19:05 (in scheduler terms: now + 7min), then the
    // provider moves the start by 30 minutes before the job fires. Only
    // the new due instant may remain.
    let scheduler = NoticeScheduler::new().await.unwrap();
    let lead = Duration::minutes(5);
    let original_start = Utc::now() + Duration::minutes(12);
    let moved_start = original_start + Duration::minutes(30);

    let plans = plan(&[make_game("g1", original_start)], Utc::now(), lead);
    let PlanAction::Schedule { fire_at: original_due } = plans[0].action else {
        panic!("expected a schedule action");
    };
    scheduler
        .schedule_replace(&job_key("g1"), original_due, noop_task())
        .await
        .unwrap();

    let plans = plan(&[make_game("g1", moved_start)], Utc::now(), lead);
    let PlanAction::Schedule { fire_at: moved_due } = plans[0].action else {
        panic!("expected a schedule action");
    };
    let outcome = scheduler
        .schedule_replace(&job_key("g1"), moved_due, noop_task())
        .await
        .unwrap();

    assert_eq!(outcome, ScheduleOutcome::Replaced);
    assert_eq!(moved_due, original_due + Duration::minutes(30));
    assert_eq!(scheduler.pending_count().await, 1);
    assert_eq!(scheduler.fire_time(&job_key("g1")).await, Some(moved_due));
}

#[tokio::test]
async fn skip_plan_cancels_any_stale_job() {
    let scheduler = NoticeScheduler::new().await.unwrap();
    scheduler
        .schedule_replace(&job_key("g1"), Utc::now() + Duration::hours(1), noop_task())
        .await
        .unwrap();

    // Later the game is found already started: Skip must cancel.
    let plans = plan(
        &[make_game("g1", at(19, 10, 0))],
        at(19, 20, 0),
        Duration::minutes(5),
    );
    assert_eq!(plans[0].action, PlanAction::Skip);
    assert!(scheduler.cancel(&job_key("g1")).await.unwrap());
    assert_eq!(scheduler.pending_count().await, 0);
}

// =============================================================================
// Transaction dedup scenarios
// =============================================================================

#[test]
fn a_transaction_is_mentioned_at_most_once_across_cycles() {
    let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let mut seen: HashSet<i64> = HashSet::new();

    // Cycle 1: window returns ids 1..=3, all new.
    let window = vec![make_tx(1, "TR", date), make_tx(2, "SFA", date), make_tx(3, "IL", date)];
    let fresh = partition_new(&window, &seen);
    assert_eq!(fresh.len(), 3);
    seen.extend(window.iter().map(|t| t.transaction_id));

    // Cycle 2: the rolling window re-fetches 1..=3 plus new id 4.
    let mut window = window;
    window.push(make_tx(4, "TR", date));
    let fresh = partition_new(&window, &seen);
    let ids: Vec<i64> = fresh.iter().map(|t| t.transaction_id).collect();
    assert_eq!(ids, vec![4]);
    seen.extend(window.iter().map(|t| t.transaction_id));

    // Cycle 3: nothing new, nothing announced.
    assert!(partition_new(&window, &seen).is_empty());
}

#[test]
fn five_new_transactions_three_kinds_user_subscribed_to_two() {
    // One poll cycle: 2 trades, 1 signing, 2 IL moves. A user enabled for
    // trades + injuries gets exactly one message with exactly those 4.
    let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let fresh = vec![
        make_tx(1, "TR", date),
        make_tx(2, "TR", date),
        make_tx(3, "SFA", date),
        make_tx(4, "IL", date),
        make_tx(5, "IL", date),
    ];

    let mut user = User::new(42, None, None);
    user.enabled_kinds = [TransactionKind::Trade, TransactionKind::InjuredList]
        .into_iter()
        .collect();

    let subset = select_for_user(&fresh, &user);
    assert_eq!(subset.len(), 4);

    let message = render_transaction_batch(&subset, MARINERS).unwrap();
    assert!(message.contains("Move number 1"));
    assert!(message.contains("Move number 2"));
    assert!(!message.contains("Move number 3"));
    assert!(message.contains("Move number 4"));
    assert!(message.contains("Move number 5"));
    // One outbound message, not one per record.
    assert_eq!(message.matches("ROSTER TRANSACTION UPDATE").count(), 1);
}

#[test]
fn empty_selection_means_no_message_for_that_destination() {
    let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    let fresh = vec![make_tx(1, "TR", date)];

    let mut user = User::new(42, None, None);
    user.enabled_kinds.clear();

    let subset = select_for_user(&fresh, &user);
    assert!(render_transaction_batch(&subset, MARINERS).is_none());
}
