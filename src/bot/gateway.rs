//! Message delivery gateway.
//!
//! The trait keeps the sync cycles transport-agnostic; the Telegram
//! implementation retries transient failures with backoff and honors the
//! server's retry-after on flood control.

use std::time::Duration;

use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use teloxide::RequestError;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("telegram error: {0}")]
    Telegram(String),

    #[error("delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

/// Fire-and-forget message delivery with a success/failure result.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, link_preview: bool)
        -> Result<(), DeliveryError>;
}

pub struct TelegramGateway {
    bot: Bot,
    max_retries: u32,
}

impl TelegramGateway {
    pub fn new(bot: Bot, max_retries: u32) -> Self {
        Self { bot, max_retries }
    }
}

fn disabled_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        link_preview: bool,
    ) -> Result<(), DeliveryError> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            let mut request = self
                .bot
                .send_message(ChatId(chat_id), text)
                .parse_mode(ParseMode::Html);
            if !link_preview {
                request = request.link_preview_options(disabled_preview());
            }

            match request.await {
                Ok(_) => return Ok(()),
                Err(RequestError::RetryAfter(seconds)) => {
                    warn!(chat_id, attempt = attempt + 1, "Flood control, backing off");
                    tokio::time::sleep(seconds.duration()).await;
                    last_error = "flood control".to_string();
                }
                Err(e @ (RequestError::Network(_) | RequestError::Io(_))) => {
                    let delay_ms = 500 * 2u64.pow(attempt);
                    warn!(chat_id, error = %e, delay_ms, attempt = attempt + 1, "Send failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = e.to_string();
                }
                // API rejections (blocked bot, unknown chat) won't heal
                // with a retry.
                Err(e) => return Err(DeliveryError::Telegram(e.to_string())),
            }
        }

        Err(DeliveryError::RetriesExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }
}
