//! Configuration management.
//!
//! Loads settings from environment variables and .env file.

use std::time::Duration;

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Settings {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_channel_id: Option<i64>,

    // MLB Stats API
    pub mlb_api_base_url: String,
    pub team_id: i64,
    pub api_timeout_secs: u64,
    pub api_rate_limit_per_sec: u32,
    pub api_max_retries: u32,

    // Database
    pub database_url: String,

    // Notification timing
    pub notification_lead_minutes: i64,
    pub current_game_grace_hours: i64,

    // Poll cadence
    pub schedule_sync_hour: u32,
    pub transaction_poll_minutes: u64,
    pub transaction_window_days: i64,

    // Delivery
    pub delivery_max_retries: u32,

    // Human-local time display
    pub display_utc_offset_hours: i32,
    pub display_tz_label: String,

    // Logging
    pub log_level: String,
    pub log_json: bool,
}

impl Settings {
    /// Load settings from environment variables (and .env file).
    pub fn from_env() -> Self {
        // Try to load .env file (ignore if not found).
        let _ = dotenvy::dotenv();

        Self {
            telegram_bot_token: env_str("TELEGRAM_BOT_TOKEN", ""),
            telegram_channel_id: env_opt_i64("TELEGRAM_CHANNEL_ID"),

            mlb_api_base_url: env_str("MLB_API_BASE_URL", "https://statsapi.mlb.com/api/v1"),
            team_id: env_i64("TEAM_ID", 136),
            api_timeout_secs: env_u64("API_TIMEOUT_SECONDS", 30),
            api_rate_limit_per_sec: env_u32("API_RATE_LIMIT_PER_SEC", 5),
            api_max_retries: env_u32("API_MAX_RETRIES", 3),

            database_url: env_str("DATABASE_URL", "sqlite://data/mariners_bot.db"),

            notification_lead_minutes: env_i64("NOTIFICATION_LEAD_MINUTES", 5),
            current_game_grace_hours: env_i64("CURRENT_GAME_GRACE_HOURS", 2),

            schedule_sync_hour: env_u32("SCHEDULE_SYNC_HOUR", 6),
            transaction_poll_minutes: env_u64("TRANSACTION_POLL_MINUTES", 5),
            transaction_window_days: env_i64("TRANSACTION_WINDOW_DAYS", 14),

            delivery_max_retries: env_u32("DELIVERY_MAX_RETRIES", 3),

            display_utc_offset_hours: env_i32("DISPLAY_UTC_OFFSET_HOURS", -7),
            display_tz_label: env_str("DISPLAY_TZ_LABEL", "PT"),

            log_level: env_str("LOG_LEVEL", "info"),
            log_json: env_bool("LOG_JSON", false),
        }
    }

    /// Validate configuration for critical requirements.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.telegram_bot_token.is_empty() {
            errors.push("TELEGRAM_BOT_TOKEN is required".to_string());
        }

        if self.notification_lead_minutes <= 0 {
            errors.push("NOTIFICATION_LEAD_MINUTES must be positive".to_string());
        }

        if self.schedule_sync_hour > 23 {
            errors.push("SCHEDULE_SYNC_HOUR must be in 0..=23".to_string());
        }

        if self.transaction_poll_minutes == 0 {
            errors.push("TRANSACTION_POLL_MINUTES must be positive".to_string());
        }

        if self.transaction_window_days <= 0 {
            errors.push("TRANSACTION_WINDOW_DAYS must be positive".to_string());
        }

        if !(-12..=14).contains(&self.display_utc_offset_hours) {
            errors.push("DISPLAY_UTC_OFFSET_HOURS must be in -12..=14".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Interval between transaction poll cycles.
    pub fn transaction_poll_interval(&self) -> Duration {
        Duration::from_secs(self.transaction_poll_minutes * 60)
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_i32(key: &str, default: i32) -> i32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
