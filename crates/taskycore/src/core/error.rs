use thiserror::Error;

/// Centralized error types for the application
///
/// Every fallible operation in the core returns this enum so the router
/// boundary can log one type and answer the user uniformly.
/// Uses `thiserror` for automatic error conversion and display formatting.
///
/// # Example
///
/// ```no_run
/// use taskycore::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Entity bodies that fail to (de)serialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking store task was cancelled or panicked
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Telegram API errors
    #[cfg(feature = "telegram")]
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// A referenced entity does not exist
    #[error("{collection} #{id} not found")]
    NotFound { collection: &'static str, id: i64 },

    /// User-supplied text failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A callback token whose parameters don't have the expected shape
    #[error("Malformed callback token '{token}': {reason}")]
    MalformedToken { token: String, reason: String },

    /// Router assembly errors (duplicate command, bad pattern)
    #[error("Registration error: {0}")]
    Registration(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn malformed(token: &str, reason: impl Into<String>) -> Self {
        AppError::MalformedToken {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Registration(err.to_string())
    }
}
