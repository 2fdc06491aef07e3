//! Schedule sync cycle.
//!
//! Fetch the remaining season schedule, upsert it, then reconcile notice
//! jobs against the refreshed game set. Runs at startup and on the daily
//! cron; safe to run any time because planning and scheduling are both
//! idempotent.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, error, info};

use crate::context::AppContext;
use crate::planner::plan::{job_key, plan, PlanAction};
use crate::scheduler::{NoticeScheduler, ScheduleOutcome, Task};
use crate::sync::dispatch::{JobDispatcher, JobPayload};
use crate::sync::SyncError;

pub struct ScheduleSync {
    ctx: Arc<AppContext>,
    scheduler: NoticeScheduler,
    dispatcher: Arc<JobDispatcher>,
}

impl ScheduleSync {
    pub fn new(
        ctx: Arc<AppContext>,
        scheduler: NoticeScheduler,
        dispatcher: Arc<JobDispatcher>,
    ) -> Self {
        Self {
            ctx,
            scheduler,
            dispatcher,
        }
    }

    pub async fn run(&self) -> Result<(), SyncError> {
        info!("Starting schedule sync");

        let now = Utc::now();
        let season = now.year();
        let start = now.date_naive();
        // Remaining games this season.
        let end = NaiveDate::from_ymd_opt(season, 12, 31).unwrap_or(start);

        let games = self.ctx.client.fetch_schedule(start, end, season).await?;
        for game in &games {
            self.ctx.store.games.upsert(game).await?;
        }

        let plannable = self.ctx.store.games.plannable().await?;
        let plans = plan(&plannable, now, self.ctx.lead());

        let mut scheduled = 0usize;
        let mut skipped = 0usize;
        for game_plan in &plans {
            let key = job_key(&game_plan.game_id);
            match &game_plan.action {
                PlanAction::Schedule { fire_at } => {
                    let task = self.notice_task(&game_plan.game_id);
                    match self.scheduler.schedule_replace(&key, *fire_at, task).await {
                        Ok(ScheduleOutcome::Unchanged) => {}
                        Ok(_) => scheduled += 1,
                        Err(e) => {
                            error!(game_id = %game_plan.game_id, error = %e, "Failed to schedule notice")
                        }
                    }
                }
                PlanAction::InWindow => {
                    debug!(game_id = %game_plan.game_id, "Inside lead window, on-demand only");
                }
                PlanAction::Skip => {
                    if let Err(e) = self.scheduler.cancel(&key).await {
                        error!(game_id = %game_plan.game_id, error = %e, "Failed to cancel stale job");
                    }
                    self.ctx.store.games.mark_skipped(&game_plan.game_id).await?;
                    skipped += 1;
                }
            }
        }

        info!(
            fetched = games.len(),
            plannable = plannable.len(),
            scheduled,
            skipped,
            "Schedule sync completed"
        );
        Ok(())
    }

    fn notice_task(&self, game_id: &str) -> Task {
        let dispatcher = Arc::clone(&self.dispatcher);
        let payload = JobPayload::game_notice(game_id);
        Arc::new(move || {
            let dispatcher = Arc::clone(&dispatcher);
            let payload = payload.clone();
            Box::pin(async move {
                dispatcher.dispatch(payload).await;
            })
        })
    }
}
