//! Per-event handler context.

use std::str::FromStr;
use std::sync::Arc;

use crate::bot::conversation::SKIP_COMMAND;
use crate::bot::event::{EventKind, InboundEvent, OutboundMessage, Reply, Sender};
use crate::bot::keyboard::Keyboard;
use crate::bot::registry::Catalog;
use crate::core::error::{AppError, AppResult};
use crate::storage::models::User;
use crate::storage::Store;

/// Shared dependencies cloned into every handler.
#[derive(Clone)]
pub struct Services {
    pub store: Store,
    pub catalog: Arc<Catalog>,
}

/// Positional parameters of an `action[:param]*` callback token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackArgs {
    token: String,
    action: String,
    params: Vec<String>,
}

impl CallbackArgs {
    pub fn from_token(token: &str) -> Self {
        let mut parts = token.split(':');
        let action = parts.next().unwrap_or_default().to_string();
        Self {
            token: token.to_string(),
            action,
            params: parts.map(str::to_string).collect(),
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn param(&self, idx: usize) -> AppResult<&str> {
        self.params
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| AppError::malformed(&self.token, format!("missing parameter {}", idx)))
    }

    /// Entity id parameter
    pub fn id(&self, idx: usize) -> AppResult<i64> {
        let raw = self.param(idx)?;
        raw.parse()
            .map_err(|_| AppError::malformed(&self.token, format!("'{}' is not an id", raw)))
    }

    /// Page parameter; a token without one means the first page
    pub fn page(&self, idx: usize) -> AppResult<usize> {
        match self.params.get(idx) {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::malformed(&self.token, format!("'{}' is not a page", raw))),
        }
    }

    /// Enum literal parameter, parsed through the enum's `FromStr`
    pub fn parse<T: FromStr>(&self, idx: usize) -> AppResult<T> {
        let raw = self.param(idx)?;
        raw.parse()
            .map_err(|_| AppError::malformed(&self.token, format!("unexpected value '{}'", raw)))
    }
}

pub struct HandlerContext {
    pub services: Services,
    pub event: InboundEvent,
    pub args: CallbackArgs,
}

impl HandlerContext {
    pub fn new(services: Services, event: InboundEvent) -> Self {
        let args = event.callback_token().map(CallbackArgs::from_token).unwrap_or_default();
        Self { services, event, args }
    }

    pub fn store(&self) -> &Store {
        &self.services.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.services.catalog
    }

    pub fn sender(&self) -> &Sender {
        &self.event.user
    }

    pub fn chat_id(&self) -> i64 {
        self.event.chat_id
    }

    pub fn is_callback(&self) -> bool {
        self.event.is_callback()
    }

    /// Free text of a text event
    pub fn text(&self) -> Option<&str> {
        match &self.event.kind {
            EventKind::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Whatever followed the command name
    pub fn command_args(&self) -> &str {
        match &self.event.kind {
            EventKind::Command { args, .. } => args,
            _ => "",
        }
    }

    pub fn is_skip(&self) -> bool {
        self.event.command_name() == Some(SKIP_COMMAND)
    }

    /// The stored user for the sender, created on first contact
    pub async fn current_user(&self) -> AppResult<User> {
        let sender = self.sender().clone();
        let telegram_id = sender.id;
        let (user, created) = self
            .store()
            .users
            .find_or_create(
                move |u| u.telegram_id == telegram_id,
                move || {
                    let mut user = User::new(sender.id, sender.first_name);
                    user.username = sender.username;
                    user.last_name = sender.last_name;
                    if let Some(language) = sender.language_code {
                        user.language_code = language;
                    }
                    user
                },
            )
            .await?;
        if created {
            log::info!("Registered new user {} (telegram id {})", user.id, telegram_id);
        }
        Ok(user)
    }

    /// A screen answer: edits the pressed message for callbacks, sends a new one otherwise
    pub fn screen(&self, text: impl Into<String>, keyboard: Keyboard) -> Reply {
        let message = OutboundMessage::html(text).with_keyboard(keyboard);
        if self.is_callback() {
            Reply::message(message.edit_origin())
        } else {
            Reply::message(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::TaskStatus;

    #[test]
    fn test_callback_args() {
        let args = CallbackArgs::from_token("task_status:7:DONE");
        assert_eq!(args.action(), "task_status");
        assert_eq!(args.len(), 2);
        assert_eq!(args.id(0).unwrap(), 7);
        assert_eq!(args.parse::<TaskStatus>(1).unwrap(), TaskStatus::Done);
    }

    #[test]
    fn test_callback_args_page_defaults_to_first() {
        assert_eq!(CallbackArgs::from_token("list_projects").page(0).unwrap(), 0);
        assert_eq!(CallbackArgs::from_token("list_projects:2").page(0).unwrap(), 2);
        assert!(CallbackArgs::from_token("list_projects:two").page(0).is_err());
    }

    #[test]
    fn test_callback_args_malformed() {
        let args = CallbackArgs::from_token("project:abc");
        assert!(matches!(args.id(0), Err(AppError::MalformedToken { .. })));
        assert!(matches!(args.param(3), Err(AppError::MalformedToken { .. })));
        assert!(args.parse::<TaskStatus>(0).is_err());
    }
}
