//! Integration tests for the Telegram adapter
//!
//! Run with: cargo test -p tasky --test adapter_test

mod common;

use common::*;
use teloxide::types::{CallbackQuery, Message};
use teloxide::utils::command::BotCommands;

use tasky::telegram::events::{callback_event, message_event};
use tasky::telegram::Command;
use taskycore::bot::event::EventKind;

// ============================================================================
// Update conversion
// ============================================================================

mod conversion {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_message() {
        let json = message_json(
            user_json(TEST_USER_ID, false),
            private_chat_json(TEST_USER_ID),
            "/approve@TaskyBot 12",
        );
        let msg: Message = serde_json::from_value(json).unwrap();

        let event = message_event(&msg).unwrap();
        assert_eq!(event.chat_id, TEST_USER_ID);
        assert_eq!(event.user.id, TEST_USER_ID);
        assert_eq!(event.user.username.as_deref(), Some("testuser"));
        assert_eq!(event.user.language_code.as_deref(), Some("en"));
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "approve".to_string(),
                args: "12".to_string()
            }
        );
    }

    #[test]
    fn test_group_text_keeps_group_chat() {
        let json = message_json(
            user_json(TEST_USER_ID, false),
            group_chat_json(TEST_GROUP_ID),
            "Alpha",
        );
        let msg: Message = serde_json::from_value(json).unwrap();

        let event = message_event(&msg).unwrap();
        assert_eq!(event.chat_id, TEST_GROUP_ID);
        assert_eq!(event.kind, EventKind::Text { text: "Alpha".to_string() });
    }

    #[test]
    fn test_messages_from_bots_are_ignored() {
        let json = message_json(user_json(42, true), group_chat_json(TEST_GROUP_ID), "/start");
        let msg: Message = serde_json::from_value(json).unwrap();

        assert!(message_event(&msg).is_none());
    }

    #[test]
    fn test_callback_uses_origin_chat() {
        let origin = message_json(user_json(1, true), group_chat_json(TEST_GROUP_ID), "Projects");
        let json = callback_json(user_json(TEST_USER_ID, false), Some(origin), "project:12");
        let q: CallbackQuery = serde_json::from_value(json).unwrap();

        let event = callback_event(&q).unwrap();
        assert_eq!(event.chat_id, TEST_GROUP_ID);
        assert_eq!(event.callback_token(), Some("project:12"));
    }

    #[test]
    fn test_callback_without_message_falls_back_to_private_chat() {
        let json = callback_json(user_json(TEST_USER_ID, false), None, "menu");
        let q: CallbackQuery = serde_json::from_value(json).unwrap();

        let event = callback_event(&q).unwrap();
        assert_eq!(event.chat_id, TEST_USER_ID);
    }
}

// ============================================================================
// Command menu
// ============================================================================

mod command_menu {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use taskycore::{default_apps, Application, SessionStore, Store};
    use tempfile::TempDir;

    #[test]
    fn test_menu_matches_routed_commands() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("menu-test.sqlite");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        let app = Application::assemble(store, default_apps(), Arc::new(SessionStore::default()));

        let mut published: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command.trim_start_matches('/').to_string())
            .collect();
        published.sort();

        let mut routed: Vec<String> = app
            .router()
            .command_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        routed.sort();

        assert_eq!(published, routed);
    }
}
