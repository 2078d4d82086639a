//! Transport-neutral inbound events and outbound replies.
//!
//! The Telegram adapter converts updates into [`InboundEvent`]s and renders
//! [`Reply`]s back; nothing in here knows about the Bot API.

use crate::bot::keyboard::Keyboard;

/// Who sent an event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
}

impl Sender {
    pub fn new(id: i64, first_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`; `name` is lowercased and stripped of `/` and `@bot`
    Command { name: String, args: String },
    /// Button press carrying an `action[:param]*` token
    Callback { token: String },
    Text { text: String },
}

/// Conversation sessions are partitioned by (chat, user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub chat_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub kind: EventKind,
    pub user: Sender,
    pub chat_id: i64,
}

impl InboundEvent {
    /// Classifies a message text: commands start with `/`, anything else is free text.
    pub fn from_text(user: Sender, chat_id: i64, text: &str) -> Self {
        let kind = match parse_command(text) {
            Some((name, args)) => EventKind::Command { name, args },
            None => EventKind::Text { text: text.to_string() },
        };
        Self { kind, user, chat_id }
    }

    pub fn command(user: Sender, chat_id: i64, name: &str, args: &str) -> Self {
        Self {
            kind: EventKind::Command {
                name: normalize_command(name),
                args: args.trim().to_string(),
            },
            user,
            chat_id,
        }
    }

    pub fn callback(user: Sender, chat_id: i64, token: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Callback { token: token.into() },
            user,
            chat_id,
        }
    }

    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            chat_id: self.chat_id,
            user_id: self.user.id,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.kind, EventKind::Callback { .. })
    }

    pub fn callback_token(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Callback { token } => Some(token),
            _ => None,
        }
    }

    pub fn command_name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Command { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        match &self.kind {
            EventKind::Command { name, .. } => format!("/{}", name),
            EventKind::Callback { token } => format!("callback {}", token),
            EventKind::Text { text } => format!("text ({} chars)", text.chars().count()),
        }
    }
}

fn normalize_command(name: &str) -> String {
    let name = name.trim().trim_start_matches('/');
    let name = name.split('@').next().unwrap_or(name);
    name.to_lowercase()
}

/// `"/Start@TaskyBot  hello"` → `("start", "hello")`
fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    if head.is_empty() {
        return None;
    }
    Some((normalize_command(head), args.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    Plain,
    #[default]
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    #[default]
    New,
    /// Replace the message whose button produced the callback
    EditOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub format: TextFormat,
    pub keyboard: Option<Keyboard>,
    pub delivery: Delivery,
}

impl OutboundMessage {
    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Html,
            keyboard: None,
            delivery: Delivery::New,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Plain,
            ..Self::html(text)
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = (!keyboard.is_empty()).then_some(keyboard);
        self
    }

    pub fn edit_origin(mut self) -> Self {
        self.delivery = Delivery::EditOrigin;
        self
    }
}

/// Everything a handler wants sent back for one event.
///
/// `notice` is the toast shown when a callback is acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub messages: Vec<OutboundMessage>,
    pub notice: Option<String>,
}

impl Reply {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn message(message: OutboundMessage) -> Self {
        Self {
            messages: vec![message],
            notice: None,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self::message(OutboundMessage::html(text))
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::message(OutboundMessage::plain(text))
    }

    pub fn notice_only(notice: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            notice: Some(notice.into()),
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    /// Attaches `keyboard` to the last message
    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        if let Some(last) = self.messages.pop() {
            self.messages.push(last.with_keyboard(keyboard));
        }
        self
    }

    pub fn then(mut self, other: Reply) -> Self {
        self.messages.extend(other.messages);
        if other.notice.is_some() {
            self.notice = other.notice;
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.notice.is_none()
    }

    /// Text of the first message, handy in tests and logs
    pub fn text(&self) -> &str {
        self.messages.first().map(|m| m.text.as_str()).unwrap_or_default()
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        self.messages.iter().rev().find_map(|m| m.keyboard.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::{back_button, Keyboard};
    use pretty_assertions::assert_eq;

    fn user() -> Sender {
        Sender::new(7, "Ada")
    }

    #[test]
    fn test_from_text_command_normalised() {
        let event = InboundEvent::from_text(user(), 1, "/CreateProject@TaskyBot  some args ");
        assert_eq!(
            event.kind,
            EventKind::Command {
                name: "createproject".to_string(),
                args: "some args".to_string()
            }
        );
    }

    #[test]
    fn test_from_text_plain_and_bare_slash() {
        let event = InboundEvent::from_text(user(), 1, "Alpha");
        assert_eq!(event.kind, EventKind::Text { text: "Alpha".to_string() });

        let slash = InboundEvent::from_text(user(), 1, "/");
        assert!(matches!(slash.kind, EventKind::Text { .. }));
    }

    #[test]
    fn test_session_key() {
        let event = InboundEvent::callback(user(), 99, "menu");
        assert_eq!(event.session_key(), SessionKey { chat_id: 99, user_id: 7 });
        assert!(event.is_callback());
        assert_eq!(event.callback_token(), Some("menu"));
    }

    #[test]
    fn test_reply_builders() {
        let reply = Reply::html("<b>Hi</b>")
            .with_keyboard(Keyboard::column([back_button("menu")]))
            .then(Reply::notice_only("Done"));
        assert_eq!(reply.text(), "<b>Hi</b>");
        assert_eq!(reply.keyboard().map(|k| k.tokens()), Some(vec!["menu"]));
        assert_eq!(reply.notice.as_deref(), Some("Done"));
        assert!(Reply::empty().is_empty());
    }

    #[test]
    fn test_empty_keyboard_is_dropped() {
        let message = OutboundMessage::plain("x").with_keyboard(Keyboard::default());
        assert!(message.keyboard.is_none());
    }
}
