//! Transaction sync cycle.
//!
//! Fetch the rolling window, announce what has never been seen, then mark
//! the WHOLE fetched batch seen. Per-user filtering affects delivery
//! only, so a record is evaluated for newness exactly once even if a
//! user's preferences change later.

use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::context::AppContext;
use crate::data::messages::render_transaction_batch;
use crate::planner::dedup::{group_by_kind, partition_new, select_for_user};
use crate::sync::SyncError;

pub struct TransactionSync {
    ctx: Arc<AppContext>,
}

impl TransactionSync {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> Result<(), SyncError> {
        debug!("Starting transaction sync");

        let settings = &self.ctx.settings;
        let team_id = settings.team_id;

        let end = Utc::now().date_naive();
        let start = end - Duration::days(settings.transaction_window_days);

        let batch: Vec<_> = self
            .ctx
            .client
            .fetch_transactions(start, end)
            .await?
            .into_iter()
            .filter(|tx| tx.involves_team(team_id))
            .collect();

        if batch.is_empty() {
            debug!("No transactions in window");
            return Ok(());
        }

        let ids: Vec<i64> = batch.iter().map(|tx| tx.transaction_id).collect();
        let known = self.ctx.store.transactions.known_ids(&ids).await?;
        let fresh = partition_new(&batch, &known);

        if fresh.is_empty() {
            self.ctx.store.transactions.upsert_all(&batch).await?;
            debug!(fetched = batch.len(), "No new transactions");
            return Ok(());
        }

        for (kind, records) in group_by_kind(&fresh) {
            debug!(kind = kind.tag(), count = records.len(), "New transactions");
        }
        info!(new = fresh.len(), "Found new transactions");

        // One message per destination per cycle: the channel gets every
        // new record, each subscriber their preference-filtered subset.
        let mut deliveries: Vec<(i64, String)> = Vec::new();
        if let Some(channel) = settings.telegram_channel_id {
            if let Some(text) = render_transaction_batch(&fresh, team_id) {
                deliveries.push((channel, text));
            }
        }
        for user in self.ctx.store.users.subscribed().await? {
            let subset = select_for_user(&fresh, &user);
            if let Some(text) = render_transaction_batch(&subset, team_id) {
                deliveries.push((user.chat_id, text));
            }
        }

        let sends = deliveries.iter().map(|(chat_id, text)| {
            let gateway = Arc::clone(&self.ctx.gateway);
            let chat_id = *chat_id;
            async move { (chat_id, gateway.send(chat_id, text, false).await) }
        });

        let mut sent = 0usize;
        for (chat_id, result) in join_all(sends).await {
            match result {
                Ok(()) => sent += 1,
                Err(e) => error!(chat_id, error = %e, "Transaction notification failed"),
            }
        }

        // Everything fetched becomes seen, delivered or not.
        self.ctx.store.transactions.upsert_all(&batch).await?;

        info!(
            fetched = batch.len(),
            new = fresh.len(),
            destinations = deliveries.len(),
            sent,
            "Transaction sync completed"
        );
        Ok(())
    }
}
