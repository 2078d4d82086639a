//! Common test utilities
//!
//! Builds a fully assembled application over a throwaway SQLite file.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use taskycore::bot::event::{InboundEvent, Reply, Sender, SessionKey};
use taskycore::bot::session::SessionStore;
use taskycore::{default_apps, Application, Store};
use tempfile::TempDir;

pub const CHAT_ID: i64 = 1000;

pub struct TestBot {
    pub app: Application,
    // keeps the database file alive for the lifetime of the test
    _dir: TempDir,
}

impl TestBot {
    pub fn new() -> Self {
        Self::with_idle_timeout(Duration::from_secs(60))
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("tasky-test.sqlite");
        let store = Store::open(path.to_str().expect("utf-8 path")).expect("open store");
        let sessions = Arc::new(SessionStore::new(idle_timeout));
        Self {
            app: Application::assemble(store, default_apps(), sessions),
            _dir: dir,
        }
    }

    pub fn store(&self) -> &Store {
        self.app.store()
    }

    pub async fn text(&self, user: &Sender, text: &str) -> Reply {
        self.app
            .handle(InboundEvent::from_text(user.clone(), CHAT_ID, text))
            .await
    }

    pub async fn press(&self, user: &Sender, token: &str) -> Reply {
        self.app
            .handle(InboundEvent::callback(user.clone(), CHAT_ID, token))
            .await
    }

    /// `(flow, state)` of the user's open conversation
    pub async fn session_state(&self, user: &Sender) -> Option<(&'static str, &'static str)> {
        let key = SessionKey {
            chat_id: CHAT_ID,
            user_id: user.id,
        };
        self.app.sessions().get(key).await.map(|s| (s.flow_id, s.state))
    }
}

pub fn alice() -> Sender {
    Sender::new(101, "Alice")
}

pub fn bob() -> Sender {
    Sender::new(202, "Bob")
}
