//! App plugin registry.
//!
//! Feature apps describe themselves through [`BotApp`]; the registry orders
//! them, gives each an isolated [`RouterBuilder`] and merges the ones that
//! register cleanly. The result is the frozen [`Router`] plus a [`Catalog`]
//! of menu entries and help text.

use crate::bot::keyboard::Button;
use crate::bot::router::{Router, RouterBuilder};
use crate::core::error::AppResult;

/// Static description of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppMeta {
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    /// Ascending; ties keep registration-list order
    pub order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The app has no handlers to contribute
    NotProvided,
}

/// A self-describing feature module.
pub trait BotApp: Send + Sync {
    fn meta(&self) -> AppMeta;

    /// Adds the app's commands, callbacks and flows.
    fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
        let _ = router;
        Ok(Registration::NotProvided)
    }

    fn menu_entries(&self) -> Vec<Button> {
        Vec::new()
    }

    fn help_text(&self) -> Option<String> {
        None
    }
}

/// Summary of an app that made it into the running router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSummary {
    pub meta: AppMeta,
}

/// Aggregated menu and help of the registered apps, in app order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub apps: Vec<AppSummary>,
    pub menu: Vec<Button>,
    pub help: String,
}

impl Catalog {
    pub fn app_names(&self) -> Vec<&'static str> {
        self.apps.iter().map(|a| a.meta.name).collect()
    }
}

pub struct AppRegistry {
    apps: Vec<Box<dyn BotApp>>,
}

impl AppRegistry {
    /// Takes apps in discovery order and sorts them by declared order (stable).
    pub fn new(mut apps: Vec<Box<dyn BotApp>>) -> Self {
        apps.sort_by_key(|app| app.meta().order);
        Self { apps }
    }

    pub fn all(&self) -> &[Box<dyn BotApp>] {
        &self.apps
    }

    /// Registers every app once, in order. Apps without handlers or with a
    /// failing registration are logged and left out; the rest are unaffected.
    pub fn assemble(&self) -> (Router, Catalog) {
        let mut router = RouterBuilder::new();
        let mut catalog = Catalog::default();
        let mut help_sections = Vec::new();

        for app in &self.apps {
            let meta = app.meta();
            let mut scoped = RouterBuilder::new();

            let outcome = app
                .register(&mut scoped)
                .and_then(|registration| match registration {
                    Registration::Registered => router.merge(scoped).map(|_| registration),
                    Registration::NotProvided => Ok(registration),
                });

            match outcome {
                Ok(Registration::Registered) => {
                    log::info!("{} Registered app {} (order {})", meta.emoji, meta.name, meta.order);
                    catalog.menu.extend(app.menu_entries());
                    if let Some(help) = app.help_text() {
                        help_sections.push(help.trim().to_string());
                    }
                    catalog.apps.push(AppSummary { meta });
                }
                Ok(Registration::NotProvided) => {
                    log::warn!("App {} provides no handlers, skipping", meta.name);
                }
                Err(e) => {
                    log::error!("Failed to register app {}: {}", meta.name, e);
                }
            }
        }

        catalog.help = help_sections.join("\n\n");
        (router.build(), catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::context::HandlerContext;
    use crate::bot::event::Reply;
    use pretty_assertions::assert_eq;

    async fn noop(_ctx: HandlerContext) -> AppResult<Reply> {
        Ok(Reply::empty())
    }

    struct TestApp {
        name: &'static str,
        order: i32,
        command: Option<&'static str>,
    }

    impl BotApp for TestApp {
        fn meta(&self) -> AppMeta {
            AppMeta {
                name: self.name,
                emoji: "🧪",
                description: "test",
                order: self.order,
            }
        }

        fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
            match self.command {
                Some(command) => {
                    router.callback(&format!("^{}$", self.name), noop)?;
                    router.command(command, noop)?;
                    Ok(Registration::Registered)
                }
                None => Ok(Registration::NotProvided),
            }
        }

        fn menu_entries(&self) -> Vec<Button> {
            vec![Button::new(self.name, self.name)]
        }

        fn help_text(&self) -> Option<String> {
            Some(format!("/{}", self.name))
        }
    }

    fn app(name: &'static str, order: i32, command: Option<&'static str>) -> Box<dyn BotApp> {
        Box::new(TestApp { name, order, command })
    }

    #[test]
    fn test_apps_sorted_by_order_stable() {
        let registry = AppRegistry::new(vec![
            app("c", 2, Some("c")),
            app("a", 1, Some("a")),
            app("b", 1, Some("b")),
        ]);
        let (_, catalog) = registry.assemble();
        assert_eq!(catalog.app_names(), vec!["a", "b", "c"]);
        let menu: Vec<&str> = catalog.menu.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(menu, vec!["a", "b", "c"]);
        assert_eq!(catalog.help, "/a\n\n/b\n\n/c");
    }

    #[test]
    fn test_app_without_registration_is_skipped() {
        let registry = AppRegistry::new(vec![app("a", 1, Some("a")), app("silent", 0, None)]);
        let (router, catalog) = registry.assemble();
        assert_eq!(catalog.app_names(), vec!["a"]);
        assert_eq!(router.command_names(), vec!["a"]);
    }

    #[test]
    fn test_failing_app_does_not_affect_others() {
        // "dup" collides with "a"'s command; none of its routes survive
        let registry = AppRegistry::new(vec![
            app("a", 1, Some("shared")),
            app("dup", 2, Some("shared")),
            app("z", 3, Some("z")),
        ]);
        let (router, catalog) = registry.assemble();

        assert_eq!(catalog.app_names(), vec!["a", "z"]);
        assert_eq!(router.command_names(), vec!["shared", "z"]);
        assert_eq!(router.callback_pattern("dup"), None);
        assert_eq!(router.callback_pattern("z"), Some("^z$"));
    }

    #[test]
    fn test_invalid_pattern_fails_registration() {
        struct BadPattern;
        impl BotApp for BadPattern {
            fn meta(&self) -> AppMeta {
                AppMeta {
                    name: "bad",
                    emoji: "",
                    description: "",
                    order: 0,
                }
            }
            fn register(&self, router: &mut RouterBuilder) -> AppResult<Registration> {
                router.callback("^(unclosed", noop)?;
                Ok(Registration::Registered)
            }
        }

        let (router, catalog) = AppRegistry::new(vec![Box::new(BadPattern)]).assemble();
        assert!(catalog.apps.is_empty());
        assert_eq!(router.callback_pattern("unclosed"), None);
    }
}
