//! Logging initialization
//!
//! Console + file output through `simplelog`; the rest of the code base only
//! talks to the `log` facade.

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Maps a level name from configuration to a filter, defaulting to Info
pub fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger was already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
    let level = parse_level(&config::LOG_LEVEL);

    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at startup, without secrets
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Tasky configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("DATABASE_PATH: {}", *config::DATABASE_PATH);
    log::info!("LOG_FILE_PATH: {}", *config::LOG_FILE_PATH);
    log::info!("Session idle timeout: {}s", *config::session::IDLE_TIMEOUT_SECS);

    if config::BOT_TOKEN.is_empty() {
        log::warn!("⚠️  BOT_TOKEN / TELOXIDE_TOKEN: not set");
    } else {
        log::info!("✅ Bot token configured");
    }

    match config::webhook::URL.as_deref() {
        Some(url) => log::info!("Webhook: {} (port {})", config::webhook::full_url(url), *config::webhook::PORT),
        None => log::info!("Webhook: not configured, long polling only"),
    }

    if let Some(api_url) = config::BOT_API_URL.as_deref() {
        log::info!("Custom Bot API URL: {}", api_url);
    }
}
