//! Application assembly and the error boundary around dispatch.

use indoc::indoc;
use std::sync::Arc;

use crate::bot::context::Services;
use crate::bot::event::{InboundEvent, OutboundMessage, Reply};
use crate::bot::keyboard::{Button, Keyboard};
use crate::bot::registry::{AppRegistry, BotApp, Catalog};
use crate::bot::router::Router;
use crate::bot::session::SessionStore;
use crate::storage::Store;

/// Shown when a handler fails unexpectedly; internal details stay in the log.
pub const GENERIC_ERROR_TEXT: &str = indoc! {"
    ❌ <b>Oops! Something went wrong.</b>

    Please try again or use /menu to return to the main menu.

    If the problem persists, contact support."};

/// The assembled bot: routing tables, app catalog, session store and storage.
pub struct Application {
    router: Router,
    services: Services,
    sessions: Arc<SessionStore>,
}

impl Application {
    /// Registers `apps` once and freezes the result.
    pub fn assemble(store: Store, apps: Vec<Box<dyn BotApp>>, sessions: Arc<SessionStore>) -> Self {
        let registry = AppRegistry::new(apps);
        let (router, catalog) = registry.assemble();
        log::info!(
            "Application assembled: {} apps, {} commands, {} flows",
            catalog.apps.len(),
            router.command_names().len(),
            router.flow_ids().len()
        );

        Self {
            router,
            services: Services {
                store,
                catalog: Arc::new(catalog),
            },
            sessions,
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn catalog(&self) -> &Catalog {
        &self.services.catalog
    }

    pub fn store(&self) -> &Store {
        &self.services.store
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one event end to end. Never fails: errors are logged and
    /// answered with the generic apology. An empty reply means nothing
    /// matched; callbacks must still be acknowledged by the transport.
    pub async fn handle(&self, event: InboundEvent) -> Reply {
        let description = event.describe();
        let user_id = event.user.id;
        let is_callback = event.is_callback();

        match self.router.dispatch(&self.services, &self.sessions, event).await {
            Ok(Some(reply)) => reply,
            Ok(None) => Reply::empty(),
            Err(e) => {
                log::error!("Handler failed for {} (user {}): {}", description, user_id, e);
                error_reply(is_callback)
            }
        }
    }
}

fn error_reply(is_callback: bool) -> Reply {
    let reply = Reply::message(
        OutboundMessage::html(GENERIC_ERROR_TEXT)
            .with_keyboard(Keyboard::column([Button::new("🏠 Main Menu", "menu")])),
    );
    if is_callback {
        reply.with_notice("Something went wrong")
    } else {
        reply
    }
}
