//! Seattle Mariners gameday notification bot.
//!
//! Polls the MLB Stats API for one team's schedule and roster
//! transactions, and posts Telegram messages:
//! - a push notice shortly before each game starts
//! - one batched roster-move update per poll cycle, filtered per user
//!
//! Architecture:
//! - Tokio async runtime for concurrent I/O
//! - Rate-limited REST client for the MLB Stats API
//! - SQLite store: games, the transaction seen-set, users
//! - Cron scheduler driving one-shot notice jobs plus the poll cycles
//! - Teloxide command surface for subscriptions and preferences

mod api;
mod bot;
mod config;
mod context;
mod data;
mod planner;
mod scheduler;
mod store;
mod sync;

use std::sync::Arc;

use teloxide::Bot;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use api::client::StatsClient;
use bot::gateway::TelegramGateway;
use config::Settings;
use context::AppContext;
use scheduler::NoticeScheduler;
use store::Store;
use sync::dispatch::JobDispatcher;
use sync::schedule::ScheduleSync;
use sync::transactions::TransactionSync;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== Mariners Gameday Bot ===");
    info!(
        team_id = settings.team_id,
        base_url = %settings.mlb_api_base_url,
        "Configuration loaded"
    );

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }

    // Initialize store.
    let store = Store::connect(&settings.database_url).await?;

    // Initialize the MLB API client.
    let client = StatsClient::new(
        &settings.mlb_api_base_url,
        settings.team_id,
        settings.api_rate_limit_per_sec,
        settings.api_max_retries,
        settings.api_timeout_secs,
    )?;

    // Initialize the Telegram transport.
    let telegram = Bot::new(settings.telegram_bot_token.clone());
    let gateway = Arc::new(TelegramGateway::new(
        telegram.clone(),
        settings.delivery_max_retries,
    ));

    let ctx = Arc::new(AppContext {
        settings: settings.clone(),
        store: store.clone(),
        client,
        gateway,
    });

    // Scheduler, job dispatch, and the two sync cycles.
    let notice_scheduler = NoticeScheduler::new().await?;
    let dispatcher = Arc::new(JobDispatcher::new(Arc::clone(&ctx)));
    let schedule_sync = Arc::new(ScheduleSync::new(
        Arc::clone(&ctx),
        notice_scheduler.clone(),
        Arc::clone(&dispatcher),
    ));
    let transaction_sync = Arc::new(TransactionSync::new(Arc::clone(&ctx)));

    // Initial syncs before the scheduler takes over; a failed cycle is
    // retried on the next scheduled run.
    if let Err(e) = schedule_sync.run().await {
        warn!(error = %e, "Initial schedule sync failed");
    }
    if let Err(e) = transaction_sync.run().await {
        warn!(error = %e, "Initial transaction sync failed");
    }

    // Daily schedule sync at the configured local hour.
    let sync_hour_utc = (settings.schedule_sync_hour as i32 - settings.display_utc_offset_hours)
        .rem_euclid(24);
    let cron = format!("0 0 {sync_hour_utc} * * *");
    notice_scheduler
        .register_cron("daily_schedule_sync", &cron, {
            let schedule_sync = Arc::clone(&schedule_sync);
            Arc::new(move || {
                let schedule_sync = Arc::clone(&schedule_sync);
                Box::pin(async move {
                    if let Err(e) = schedule_sync.run().await {
                        error!(error = %e, "Schedule sync failed");
                    }
                })
            })
        })
        .await?;

    // Transaction poll on a fixed interval.
    notice_scheduler
        .register_repeated("transaction_sync", settings.transaction_poll_interval(), {
            let transaction_sync = Arc::clone(&transaction_sync);
            Arc::new(move || {
                let transaction_sync = Arc::clone(&transaction_sync);
                Box::pin(async move {
                    if let Err(e) = transaction_sync.run().await {
                        error!(error = %e, "Transaction sync failed");
                    }
                })
            })
        })
        .await?;

    notice_scheduler.start().await?;

    // Command surface.
    let command_task = bot::commands::spawn(telegram, Arc::clone(&ctx));

    info!(
        pending_notices = notice_scheduler.pending_count().await,
        "Bot started"
    );

    // Shutdown signal.
    let shutdown = Arc::new(Notify::new());
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
        info!("Shutdown signal received");
        shutdown_clone.notify_waiters();
    });

    shutdown.notified().await;

    // Graceful shutdown.
    info!("Shutting down...");
    command_task.abort();
    if let Err(e) = notice_scheduler.shutdown().await {
        error!(error = %e, "Scheduler shutdown failed");
    }
    store.close().await;
    info!("Bot shutdown complete.");

    Ok(())
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
