//! Shared application context handed to syncs, jobs, and command handlers.

use std::sync::Arc;

use chrono::Duration;

use crate::api::client::StatsClient;
use crate::bot::gateway::Gateway;
use crate::config::Settings;
use crate::store::Store;

pub struct AppContext {
    pub settings: Settings,
    pub store: Store,
    pub client: StatsClient,
    pub gateway: Arc<dyn Gateway>,
}

impl AppContext {
    /// Lead time before game start at which the push notice is due.
    pub fn lead(&self) -> Duration {
        Duration::minutes(self.settings.notification_lead_minutes)
    }

    /// Window after start during which a game still shows as current in
    /// on-demand queries.
    pub fn grace(&self) -> Duration {
        Duration::hours(self.settings.current_game_grace_hours)
    }
}
