//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::events::{callback_event, message_event};
use super::render::deliver;
use super::types::{HandlerDeps, HandlerError};

/// Creates the dispatcher schema for the Telegram bot.
///
/// Text messages and button presses are converted into core events and
/// handed to the application; everything else is ignored.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let deps = deps.clone();
        async move { handle_message(bot, msg, deps).await }
    })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_callback(bot, q, deps).await }
    })
}

async fn handle_message(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(event) = message_event(&msg) else {
        return Ok(());
    };

    let reply = deps.app.handle(event).await;
    deliver(&bot, msg.chat.id, None, &reply).await?;
    Ok(())
}

/// Every press is answered, with the reply's notice when it has one, so
/// the client stops its loading indicator even when nothing matched.
async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let Some(event) = callback_event(&q) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let chat_id = ChatId(event.chat_id);
    let origin = q.message.as_ref().map(|m| m.id());
    let reply = deps.app.handle(event).await;

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(notice) = &reply.notice {
        answer = answer.text(notice.clone());
    }
    if let Err(e) = answer.await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    deliver(&bot, chat_id, origin, &reply).await?;
    Ok(())
}
