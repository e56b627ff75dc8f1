//! Moderator notifications over Telegram.
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, WebAppInfo};
use tracing::{info, instrument, warn};
use url::Url;

use crate::texts::PANEL_BUTTON_LABEL;

/// Outbound messaging transport. One call delivers one message to one chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, chat_id: i64, html: &str, panel_url: &Url) -> Result<()>;
}

/// Inline keyboard with a single button that opens the panel as a Web App.
pub fn panel_keyboard(panel_url: &Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::web_app(
        PANEL_BUTTON_LABEL,
        WebAppInfo {
            url: panel_url.clone(),
        },
    )]])
}

/// Build a bot whose HTTP client gives up after `timeout`.
pub fn build_bot(token: &str, timeout: Duration) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()
        .context("failed to build Telegram client")?;
    Ok(Bot::with_client(token, client))
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send(&self, chat_id: i64, html: &str, panel_url: &Url) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .reply_markup(panel_keyboard(panel_url))
            .await
            .with_context(|| format!("telegram send to {} failed", chat_id))?;
        Ok(())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans a message out to every moderator. Failures are logged per recipient
/// and never returned to the caller.
pub struct NotificationDispatcher {
    messenger: Arc<dyn Messenger>,
    roster: Vec<i64>,
    panel_url: Url,
}

impl NotificationDispatcher {
    pub fn new(messenger: Arc<dyn Messenger>, roster: Vec<i64>, panel_url: Url) -> Self {
        Self {
            messenger,
            roster,
            panel_url,
        }
    }

    pub fn panel_url(&self) -> &Url {
        &self.panel_url
    }

    #[instrument(skip_all, fields(recipients = self.roster.len()))]
    pub async fn broadcast(&self, html: &str) -> DeliveryReport {
        let sends = self.roster.iter().map(|&chat_id| {
            let messenger = Arc::clone(&self.messenger);
            let panel_url = &self.panel_url;
            async move {
                match messenger.send(chat_id, html, panel_url).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(?err, chat_id, "failed to notify moderator");
                        false
                    }
                }
            }
        });

        let results = join_all(sends).await;
        let delivered = results.iter().filter(|ok| **ok).count();
        let report = DeliveryReport {
            delivered,
            failed: results.len() - delivered,
        };
        info!(delivered = report.delivered, failed = report.failed, "broadcast finished");
        report
    }
}
