//! Taskycore - project management bot core
//!
//! Everything the Tasky bot does apart from talking to Telegram: the
//! storage facade, message formatting, routing, conversations and the
//! feature apps that plug into them.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors and logging
//! - `storage`: SQLite pool, migrations, entity models and repositories
//! - `bot`: events, keyboards, router, conversation engine and app registry
//! - `apps`: the feature apps (projects, tasks, meetings, approvals, notifications)

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod apps;
pub mod bot;
pub mod core;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::apps::default_apps;
pub use crate::bot::application::Application;
pub use crate::bot::event::{InboundEvent, Reply, Sender};
pub use crate::bot::session::SessionStore;
pub use crate::core::error::{AppError, AppResult};
pub use crate::storage::Store;
