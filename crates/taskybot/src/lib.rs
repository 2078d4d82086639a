//! Tasky - Telegram bot for team project management
//!
//! The binary side of the workspace: command line, Telegram update
//! conversion and reply rendering. Everything else lives in `taskycore`.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod telegram;
