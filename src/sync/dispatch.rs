//! Scheduled-job dispatch.
//!
//! Job payloads are plain serializable data (a kind plus identifiers);
//! behavior is resolved here by kind. The game snapshot is re-read from
//! the store at fire time to pick up any late updates.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::context::AppContext;
use crate::data::messages::render_game_notice;
use crate::data::models::{GameStatus, NoticeStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    GameNotice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub kind: JobKind,
    pub game_id: String,
}

impl JobPayload {
    pub fn game_notice(game_id: &str) -> Self {
        Self {
            kind: JobKind::GameNotice,
            game_id: game_id.to_string(),
        }
    }
}

pub struct JobDispatcher {
    ctx: Arc<AppContext>,
}

impl JobDispatcher {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub async fn dispatch(&self, payload: JobPayload) {
        match payload.kind {
            JobKind::GameNotice => self.fire_game_notice(&payload.game_id).await,
        }
    }

    /// Fire path for a game notice: re-read the snapshot, refresh the
    /// pitching matchup, render, deliver, and mark notified only after a
    /// confirmed delivery.
    async fn fire_game_notice(&self, game_id: &str) {
        let store = &self.ctx.store;

        let mut game = match store.games.get(game_id).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                warn!(game_id, "Notice fired for unknown game");
                return;
            }
            Err(e) => {
                error!(game_id, error = %e, "Failed to load game for notice");
                return;
            }
        };

        if game.notice_status != NoticeStatus::Pending {
            debug!(game_id, status = game.notice_status.as_str(), "Notice already handled");
            return;
        }

        // The job can fire late (downtime, clock drift). Past the start
        // the push window is gone for good.
        let now = Utc::now();
        if now >= game.start_time {
            warn!(game_id, "Notice fired after game start, skipping");
            if let Err(e) = store.games.mark_skipped(game_id).await {
                error!(game_id, error = %e, "Failed to mark game skipped");
            }
            return;
        }

        // A postponement can land between the last sync and the fire.
        // Holding the notice is enough: the next sync reschedules it.
        match self.ctx.client.fetch_live_status(game_id).await {
            Ok(Some(status)) if status != GameStatus::Scheduled => {
                warn!(
                    game_id,
                    status = status.as_str(),
                    "Game no longer scheduled at fire time, holding notice"
                );
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(game_id, error = %e, "Failed to fetch live status"),
        }

        // Last-minute pitching matchup, best effort.
        match self.ctx.client.fetch_probable_pitchers(game_id).await {
            Ok((home, away)) => {
                if let Err(e) = store
                    .games
                    .set_probables(game_id, home.as_deref(), away.as_deref())
                    .await
                {
                    error!(game_id, error = %e, "Failed to store probable pitchers");
                }
                if home.is_some() {
                    game.home_probable = home;
                }
                if away.is_some() {
                    game.away_probable = away;
                }
            }
            Err(e) => warn!(game_id, error = %e, "Failed to fetch probable pitchers"),
        }

        let settings = &self.ctx.settings;
        let text = render_game_notice(
            &game,
            settings.team_id,
            settings.notification_lead_minutes,
            settings.display_utc_offset_hours,
            &settings.display_tz_label,
        );

        let mut destinations: Vec<i64> = Vec::new();
        if let Some(channel) = settings.telegram_channel_id {
            destinations.push(channel);
        }
        match store.users.subscribed().await {
            Ok(users) => destinations.extend(users.into_iter().map(|u| u.chat_id)),
            Err(e) => error!(error = %e, "Failed to load subscribers"),
        }

        if destinations.is_empty() {
            warn!(game_id, "No destinations for game notice");
            return;
        }

        let sends = destinations.iter().map(|chat_id| {
            let gateway = Arc::clone(&self.ctx.gateway);
            let text = text.clone();
            let chat_id = *chat_id;
            async move { (chat_id, gateway.send(chat_id, &text, true).await) }
        });

        let mut delivered = 0usize;
        for (chat_id, result) in join_all(sends).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => error!(game_id, chat_id, error = %e, "Game notice delivery failed"),
            }
        }

        if delivered > 0 {
            if let Err(e) = store.games.mark_notified(game_id).await {
                error!(game_id, error = %e, "Failed to mark game notified");
            }
            info!(game_id, delivered, destinations = destinations.len(), "Game notice sent");
        } else {
            // Left pending: the next sync or startup re-evaluates, and a
            // duplicate beats silent loss.
            error!(game_id, "Game notice failed for every destination");
        }
    }
}
