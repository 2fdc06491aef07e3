//! Telegram command surface.
//!
//! Commands only read and write user state and query the store; none of
//! the planning or dedup logic lives here.

use std::sync::Arc;

use chrono::Utc;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::context::AppContext;
use crate::data::messages::{format_local_time, render_next_game, render_preferences};
use crate::data::models::TransactionKind;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "subscribe and say hello.")]
    Start,
    #[command(description = "show this help text.")]
    Help,
    #[command(description = "show subscription status and what's coming up.")]
    Status,
    #[command(description = "turn notifications on.")]
    Subscribe,
    #[command(description = "turn notifications off.")]
    Unsubscribe,
    #[command(description = "show the next scheduled game.")]
    NextGame,
    #[command(description = "show recent roster transactions.")]
    Transactions,
    #[command(description = "show transaction notification preferences.")]
    Prefs,
    #[command(description = "toggle a transaction kind, e.g. /toggle trades.")]
    Toggle(String),
    #[command(description = "toggle the major-league-only filter.")]
    MajorLeague,
}

/// Run the command dispatcher until shutdown.
pub fn spawn(bot: Bot, ctx: Arc<AppContext>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Command dispatcher starting");
        let handler = Update::filter_message()
            .branch(dptree::entry().filter_command::<Command>().endpoint(handle_command));

        Dispatcher::builder(bot, handler)
            .dependencies(dptree::deps![ctx])
            .default_handler(|_| async {})
            .build()
            .dispatch()
            .await;
    })
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<AppContext>,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    let username = msg.from.as_ref().and_then(|u| u.username.clone());
    let first_name = msg.from.as_ref().map(|u| u.first_name.clone());

    let reply = match answer(&ctx, chat_id, username.as_deref(), first_name.as_deref(), cmd).await
    {
        Ok(reply) => reply,
        Err(e) => {
            error!(chat_id, error = %e, "Command handling failed");
            "Something went wrong, please try again later.".to_string()
        }
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn answer(
    ctx: &AppContext,
    chat_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    cmd: Command,
) -> Result<String, crate::store::StoreError> {
    // Every contact refreshes the user row (creating it with defaults on
    // first contact).
    let user = ctx.store.users.ensure(chat_id, username, first_name).await?;
    let settings = &ctx.settings;

    let reply = match cmd {
        Command::Start => format!(
            "⚾ Welcome{name}! You'll get a heads-up {lead} minutes before every game, \
             plus roster-move updates.\n\nUse /help to see what I can do.",
            name = first_name.map(|n| format!(", {n}")).unwrap_or_default(),
            lead = settings.notification_lead_minutes,
        ),

        Command::Help => Command::descriptions().to_string(),

        Command::Status => {
            let now = Utc::now();
            let mut lines = vec![format!(
                "🔔 Notifications: {}",
                if user.subscribed { "on" } else { "off" }
            )];

            let current = ctx.store.games.current_games(now, ctx.grace()).await?;
            if let Some(game) = current.first() {
                lines.push(format!(
                    "⚾ Game in progress: {} @ {} (started {})",
                    game.away_team,
                    game.home_team,
                    format_local_time(
                        game.start_time,
                        settings.display_utc_offset_hours,
                        &settings.display_tz_label
                    ),
                ));
            }

            match ctx.store.games.next_game(now).await? {
                Some(game) => lines.push(render_next_game(
                    &game,
                    settings.team_id,
                    settings.display_utc_offset_hours,
                    &settings.display_tz_label,
                )),
                None => lines.push("No upcoming games on the schedule.".to_string()),
            }

            lines.join("\n\n")
        }

        Command::Subscribe => {
            ctx.store.users.set_subscribed(chat_id, true).await?;
            "🔔 Notifications are on. See you at first pitch!".to_string()
        }

        Command::Unsubscribe => {
            ctx.store.users.set_subscribed(chat_id, false).await?;
            "🔕 Notifications are off. /subscribe to turn them back on.".to_string()
        }

        Command::NextGame => {
            let now = Utc::now();
            let current = ctx.store.games.current_games(now, ctx.grace()).await?;
            let mut lines = Vec::new();
            if let Some(game) = current.first() {
                lines.push(format!(
                    "⚾ Right now: {} @ {} (started {})",
                    game.away_team,
                    game.home_team,
                    format_local_time(
                        game.start_time,
                        settings.display_utc_offset_hours,
                        &settings.display_tz_label
                    ),
                ));
            }
            match ctx.store.games.next_game(now).await? {
                Some(game) => lines.push(render_next_game(
                    &game,
                    settings.team_id,
                    settings.display_utc_offset_hours,
                    &settings.display_tz_label,
                )),
                None if lines.is_empty() => {
                    lines.push("No upcoming games on the schedule.".to_string())
                }
                None => {}
            }
            lines.join("\n\n")
        }

        Command::Transactions => {
            let recent = ctx.store.transactions.recent(5).await?;
            if recent.is_empty() {
                "No roster transactions on record yet.".to_string()
            } else {
                let mut lines = vec!["📋 <b>Recent roster moves:</b>".to_string()];
                for tx in recent {
                    lines.push(format!(
                        "• {} {} {}",
                        tx.transaction_date.format("%b %-d"),
                        tx.kind().emoji(),
                        tx.description,
                    ));
                }
                lines.join("\n")
            }
        }

        Command::Prefs => format!(
            "{}\n\nUse /toggle &lt;kind&gt; to flip one (kinds: {}), or /majorleague \
             to filter minor-league moves.",
            render_preferences(&user),
            TransactionKind::all().map(|k| k.tag()).join(", "),
        ),

        Command::Toggle(arg) => match TransactionKind::from_tag(&arg) {
            Some(kind) => {
                let enabled = ctx.store.users.toggle_kind(chat_id, kind).await?;
                format!(
                    "{} notifications {}.",
                    kind.label(),
                    if enabled { "enabled" } else { "disabled" }
                )
            }
            None => format!(
                "I don't know that kind. Try one of: {}",
                TransactionKind::all().map(|k| k.tag()).join(", "),
            ),
        },

        Command::MajorLeague => {
            let flipped = !user.major_league_only;
            ctx.store.users.set_major_league_only(chat_id, flipped).await?;
            if flipped {
                "Major-league moves only from now on.".to_string()
            } else {
                "Showing moves at all levels.".to_string()
            }
        }
    };

    Ok(reply)
}
