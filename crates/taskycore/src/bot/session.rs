//! Conversation session store.
//!
//! One slot per (chat, user). The router locks a slot for the whole handling
//! of an event, which serialises events of one conversation while different
//! users proceed in parallel. Sessions idle past the timeout read as absent
//! and are removed by [`SessionStore::sweep`].

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::bot::event::SessionKey;
use crate::bot::keyboard::Keyboard;
use crate::core::config;
use crate::core::error::{AppError, AppResult};

/// Values collected so far by a conversation, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowFields {
    values: BTreeMap<String, String>,
}

impl FlowFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Stored value, or empty when the field was skipped or never set
    pub fn text(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// A field every terminal step relies on; missing means the flow was corrupted
    pub fn require(&self, key: &str) -> AppResult<&str> {
        self.get(key)
            .ok_or_else(|| AppError::InvalidInput(format!("conversation is missing field '{}'", key)))
    }

    pub fn require_i64(&self, key: &str) -> AppResult<i64> {
        let raw = self.require(key)?;
        raw.parse()
            .map_err(|_| AppError::InvalidInput(format!("field '{}' is not a number: {}", key, raw)))
    }

    /// A required field holding an enum literal, parsed through its `FromStr`
    pub fn require_parsed<T: FromStr>(&self, key: &str) -> AppResult<T> {
        let raw = self.require(key)?;
        raw.parse()
            .map_err(|_| AppError::InvalidInput(format!("field '{}' has unexpected value: {}", key, raw)))
    }

    /// Optional numeric field; empty or absent reads as `None`
    pub fn optional_i64(&self, key: &str) -> Option<i64> {
        self.get(key).filter(|v| !v.is_empty()).and_then(|v| v.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An open conversation: which flow, which state, what has been collected.
#[derive(Debug, Clone)]
pub struct Session {
    pub flow_id: &'static str,
    pub state: &'static str,
    pub fields: FlowFields,
    /// Buttons sent with the current state's prompt, offered again on a re-prompt
    pub choices: Option<Keyboard>,
    pub last_activity: Instant,
}

impl Session {
    pub fn new(flow_id: &'static str, state: &'static str, fields: FlowFields) -> Self {
        Self {
            flow_id,
            state,
            fields,
            choices: None,
            last_activity: Instant::now(),
        }
    }

    pub fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() >= idle_timeout
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

#[derive(Debug, Default)]
pub struct SessionSlot {
    pub session: Option<Session>,
}

pub type SharedSlot = Arc<Mutex<SessionSlot>>;

pub struct SessionStore {
    slots: DashMap<SessionKey, SharedSlot>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(config::session::idle_timeout())
    }
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// The slot for `key`, created empty on first use
    pub fn slot(&self, key: SessionKey) -> SharedSlot {
        self.slots.entry(key).or_default().value().clone()
    }

    /// Live session for `key`, if any (expired ones read as absent)
    pub async fn get(&self, key: SessionKey) -> Option<Session> {
        let slot = self.slots.get(&key).map(|s| s.value().clone())?;
        let guard = slot.lock().await;
        guard
            .session
            .as_ref()
            .filter(|s| !s.is_expired(self.idle_timeout))
            .cloned()
    }

    /// Drops any session for `key`; returns whether one was open
    pub async fn clear(&self, key: SessionKey) -> bool {
        let Some(slot) = self.slots.get(&key).map(|s| s.value().clone()) else {
            return false;
        };
        let mut guard = slot.lock().await;
        guard.session.take().is_some()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Removes expired sessions and empty slots. Slots currently locked by
    /// an in-flight event are left for the next sweep.
    ///
    /// Returns the number of expired sessions dropped.
    pub fn sweep(&self) -> usize {
        let keys: Vec<SessionKey> = self.slots.iter().map(|entry| *entry.key()).collect();
        let mut expired = 0;

        for key in keys {
            let Some(slot) = self.slots.get(&key).map(|s| s.value().clone()) else {
                continue;
            };
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            if guard.session.as_ref().is_some_and(|s| s.is_expired(self.idle_timeout)) {
                if let Some(session) = guard.session.take() {
                    log::info!(
                        "Session expired: chat={} user={} flow={} state={}",
                        key.chat_id,
                        key.user_id,
                        session.flow_id,
                        session.state
                    );
                }
                expired += 1;
            }
            let empty = guard.session.is_none();
            drop(guard);
            drop(slot);

            if empty {
                // only when no event picked the slot up in the meantime
                self.slots
                    .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);
            }
        }

        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user_id: i64) -> SessionKey {
        SessionKey { chat_id: 1, user_id }
    }

    #[test]
    fn test_flow_fields() {
        let mut fields = FlowFields::new();
        fields.set("name", "Alpha");
        fields.set("project_id", "12");
        fields.set("description", "");

        assert_eq!(fields.get("name"), Some("Alpha"));
        assert_eq!(fields.text("missing"), "");
        assert_eq!(fields.require_i64("project_id").unwrap(), 12);
        assert!(fields.require_i64("name").is_err());
        assert!(fields.require("missing").is_err());
        assert_eq!(fields.optional_i64("description"), None);
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_require_parsed_rejects_corrupted_value() {
        use crate::storage::models::TaskPriority;

        let mut fields = FlowFields::new();
        fields.set("priority", "URGENT");
        assert_eq!(fields.require_parsed::<TaskPriority>("priority").unwrap(), TaskPriority::Urgent);

        fields.set("priority", "SOMEDAY");
        assert!(matches!(
            fields.require_parsed::<TaskPriority>("priority"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(fields.require_parsed::<TaskPriority>("missing").is_err());
    }

    #[tokio::test]
    async fn test_get_and_clear() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.get(key(1)).await.is_none());

        {
            let slot = store.slot(key(1));
            slot.lock().await.session = Some(Session::new("flow", "A", FlowFields::new()));
        }
        assert_eq!(store.get(key(1)).await.map(|s| s.state), Some("A"));
        assert!(store.get(key(2)).await.is_none());

        assert!(store.clear(key(1)).await);
        assert!(!store.clear(key(1)).await);
        assert!(store.get(key(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_read_as_absent_and_are_swept() {
        let store = SessionStore::new(Duration::from_millis(20));
        {
            let slot = store.slot(key(1));
            slot.lock().await.session = Some(Session::new("flow", "A", FlowFields::new()));
        }
        // empty slot, swept without counting as expiry
        let _ = store.slot(key(2));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get(key(1)).await.is_none());

        assert_eq!(store.sweep(), 1);
        assert_eq!(store.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_slots() {
        let store = SessionStore::new(Duration::from_millis(1));
        let slot = store.slot(key(1));
        let mut guard = slot.lock().await;
        guard.session = Some(Session::new("flow", "A", FlowFields::new()));
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(store.sweep(), 0);
        assert_eq!(store.slot_count(), 1);
        drop(guard);
    }
}
