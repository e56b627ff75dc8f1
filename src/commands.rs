use anyhow::Result;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, instrument};
use url::Url;

use crate::notify::panel_keyboard;
use crate::texts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Id,
    Panel,
}

/// Parse `/start`, `/id` or `/panel`, optionally suffixed with `@botname`.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?.strip_prefix('/')?;
    let name = word.split('@').next().unwrap_or_default();
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "id" => Some(Command::Id),
        "panel" => Some(Command::Panel),
        _ => None,
    }
}

#[instrument(skip_all)]
pub async fn handle_message(bot: &Bot, msg: &Message, roster: &[i64], panel_url: &Url) -> Result<()> {
    let command = match msg.text().and_then(parse_command) {
        Some(c) => c,
        None => return Ok(()),
    };
    let user = match msg.from() {
        Some(u) => u,
        None => return Ok(()),
    };
    let user_id = user.id.0;
    let is_moderator = roster.iter().any(|id| *id as u64 == user_id);
    info!(user_id, ?command, is_moderator, "bot command");

    match command {
        Command::Id => {
            bot.send_message(msg.chat.id, texts::id_text(user_id))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Command::Start | Command::Panel if !is_moderator => {
            bot.send_message(msg.chat.id, texts::NO_ACCESS_TEXT).await?;
        }
        Command::Start => {
            bot.send_message(msg.chat.id, texts::start_text())
                .parse_mode(ParseMode::Html)
                .reply_markup(panel_keyboard(panel_url))
                .await?;
        }
        Command::Panel => {
            bot.send_message(msg.chat.id, texts::panel_text())
                .reply_markup(panel_keyboard(panel_url))
                .await?;
        }
    }
    Ok(())
}
