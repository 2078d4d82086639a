use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: tasky.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "tasky.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: tasky.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "tasky.log".to_string()));

/// Log level name (error, warn, info, debug, trace)
/// Read from LOG_LEVEL environment variable
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server (local telegram-bot-api instance)
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Webhook configuration
pub mod webhook {
    use super::{env, Lazy};

    /// Public base URL Telegram posts updates to, e.g. https://bot.example.com
    /// Read from WEBHOOK_URL environment variable
    pub static URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

    /// Path appended to the base URL
    pub const PATH: &str = "/telegram/";

    /// Local port the webhook listener binds to
    /// Read from WEBHOOK_PORT environment variable
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("WEBHOOK_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000)
    });

    /// Full webhook URL (`WEBHOOK_URL` + `PATH`), if configured
    pub fn full_url(base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), PATH)
    }
}

/// Conversation session configuration
pub mod session {
    use super::{env, Duration, Lazy};

    /// Default idle time after which an abandoned conversation is dropped
    pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

    /// How often the bot sweeps expired sessions
    pub const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

    /// Idle timeout read from SESSION_IDLE_TIMEOUT_SECS
    pub static IDLE_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("SESSION_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS)
    });

    pub fn idle_timeout() -> Duration {
        Duration::from_secs(*IDLE_TIMEOUT_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// List screens
pub mod pagination {
    /// Items per page on every list screen
    pub const LIST_PAGE_SIZE: usize = 5;

    /// Maximum number of entities offered as choice buttons inside a flow
    pub const MAX_CHOICE_BUTTONS: usize = 10;

    /// Maximum number of reminders listed by /reminders
    pub const MAX_REMINDERS_SHOWN: usize = 10;
}

/// Text formatting limits
pub mod format {
    /// Project descriptions are cut after this many characters
    pub const PROJECT_DESCRIPTION_LIMIT: usize = 150;

    /// Task descriptions are cut after this many characters
    pub const TASK_DESCRIPTION_LIMIT: usize = 200;

    /// Entity titles shown on list buttons are cut after this many characters
    pub const BUTTON_TITLE_LIMIT: usize = 30;

    /// Marker appended to truncated text
    pub const ELLIPSIS: &str = "...";

    /// Input format for deadlines and meeting times
    pub const DATETIME_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";
}

/// Storage tuning
pub mod storage {
    use super::Duration;

    /// Maximum pooled SQLite connections
    pub const POOL_MAX_SIZE: u32 = 10;

    /// SQLite busy timeout
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

/// Network configuration for the Bot API client
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (seconds)
    pub const TIMEOUT_SECS: u64 = 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_full_url_joins_path() {
        assert_eq!(
            webhook::full_url("https://bot.example.com/"),
            "https://bot.example.com/telegram/"
        );
        assert_eq!(
            webhook::full_url("https://bot.example.com"),
            "https://bot.example.com/telegram/"
        );
    }

    #[test]
    fn test_session_durations() {
        assert_eq!(session::sweep_interval(), Duration::from_secs(300));
        assert!(session::idle_timeout() >= Duration::from_secs(1));
    }
}
