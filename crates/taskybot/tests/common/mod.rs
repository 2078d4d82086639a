//! Common test utilities
//!
//! JSON builders for Telegram payloads, shaped like real Bot API updates.

#![allow(dead_code)]

use serde_json::{json, Value};

pub const TEST_USER_ID: i64 = 123456789;
pub const TEST_GROUP_ID: i64 = -100987654321;

pub fn user_json(user_id: i64, is_bot: bool) -> Value {
    json!({
        "id": user_id,
        "is_bot": is_bot,
        "first_name": "Test",
        "last_name": "User",
        "username": "testuser",
        "language_code": "en"
    })
}

pub fn private_chat_json(chat_id: i64) -> Value {
    json!({
        "id": chat_id,
        "type": "private",
        "first_name": "Test"
    })
}

pub fn group_chat_json(chat_id: i64) -> Value {
    json!({
        "id": chat_id,
        "type": "supergroup",
        "title": "Team"
    })
}

pub fn message_json(from: Value, chat: Value, text: &str) -> Value {
    json!({
        "message_id": 1,
        "date": 1234567890,
        "chat": chat,
        "from": from,
        "text": text
    })
}

pub fn callback_json(from: Value, message: Option<Value>, data: &str) -> Value {
    let mut query = json!({
        "id": "4382bfdwdsb323b2d9",
        "from": from,
        "chat_instance": "-1234567890",
        "data": data
    });
    if let Some(message) = message {
        query["message"] = message;
    }
    query
}
