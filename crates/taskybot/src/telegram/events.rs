//! Teloxide updates to core inbound events

use teloxide::types::{CallbackQuery, Message, User};

use taskycore::bot::event::{InboundEvent, Sender};

pub fn sender_from(user: &User) -> Sender {
    Sender {
        // Telegram user ids fit in 52 bits
        id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        language_code: user.language_code.clone(),
    }
}

/// Event for a text message; `None` for service messages, media and
/// messages without a human sender.
pub fn message_event(msg: &Message) -> Option<InboundEvent> {
    let text = msg.text()?;
    let from = msg.from.as_ref().filter(|u| !u.is_bot)?;
    Some(InboundEvent::from_text(sender_from(from), msg.chat.id.0, text))
}

/// Event for a button press. Presses on messages the bot can no longer
/// see fall back to the user's private chat.
pub fn callback_event(q: &CallbackQuery) -> Option<InboundEvent> {
    let data = q.data.as_deref()?;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id.0)
        .unwrap_or(q.from.id.0 as i64);
    Some(InboundEvent::callback(sender_from(&q.from), chat_id, data))
}
