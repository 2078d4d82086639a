//! Core replies to Bot API calls

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};

use taskycore::bot::event::{Delivery, OutboundMessage, Reply, TextFormat};
use taskycore::bot::keyboard::Keyboard;

pub fn inline_keyboard(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.token.clone()))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Html => Some(ParseMode::Html),
        TextFormat::Plain => None,
    }
}

/// Sends every message of `reply` to `chat_id`.
///
/// `origin` is the message whose button produced the event; messages asking
/// for an edit replace it, and fall back to a new message when the edit is
/// refused. Unchanged content is not an error.
pub async fn deliver(bot: &Bot, chat_id: ChatId, origin: Option<MessageId>, reply: &Reply) -> ResponseResult<()> {
    for message in &reply.messages {
        if let (Delivery::EditOrigin, Some(message_id)) = (message.delivery, origin) {
            match edit(bot, chat_id, message_id, message).await {
                Ok(()) => continue,
                Err(RequestError::Api(ApiError::MessageNotModified)) => {
                    log::debug!("Message {} in chat {} not modified", message_id.0, chat_id.0);
                    continue;
                }
                Err(e) => log::warn!("Edit of message {} failed ({}), sending instead", message_id.0, e),
            }
        }
        send(bot, chat_id, message).await?;
    }
    Ok(())
}

async fn send(bot: &Bot, chat_id: ChatId, message: &OutboundMessage) -> ResponseResult<()> {
    let mut request = bot.send_message(chat_id, message.text.clone());
    if let Some(mode) = parse_mode(message.format) {
        request = request.parse_mode(mode);
    }
    if let Some(keyboard) = &message.keyboard {
        request = request.reply_markup(inline_keyboard(keyboard));
    }
    request.await?;
    Ok(())
}

async fn edit(bot: &Bot, chat_id: ChatId, message_id: MessageId, message: &OutboundMessage) -> ResponseResult<()> {
    let mut request = bot.edit_message_text(chat_id, message_id, message.text.clone());
    if let Some(mode) = parse_mode(message.format) {
        request = request.parse_mode(mode);
    }
    if let Some(keyboard) = &message.keyboard {
        request = request.reply_markup(inline_keyboard(keyboard));
    }
    request.await?;
    Ok(())
}
