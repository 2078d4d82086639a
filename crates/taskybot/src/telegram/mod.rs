//! Telegram bot integration: update conversion, reply rendering and the
//! dispatcher schema

pub mod bot;
pub mod events;
pub mod render;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
