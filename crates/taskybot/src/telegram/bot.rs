//! Bot initialization
//!
//! This module contains:
//! - Command enum used for the Telegram command menu
//! - Bot instance creation

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use taskycore::core::config;

/// Commands shown in the Telegram command menu.
///
/// Routing itself happens in the core router; this enum only feeds
/// `set_my_commands`.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Tasky commands:")]
pub enum Command {
    #[command(description = "welcome screen")]
    Start,
    #[command(description = "main menu")]
    Menu,
    #[command(description = "list of commands")]
    Help,
    #[command(description = "all projects")]
    Projects,
    #[command(description = "your projects")]
    Myprojects,
    #[command(description = "create a project")]
    Createproject,
    #[command(description = "all tasks")]
    Tasks,
    #[command(description = "tasks assigned to you")]
    Mytasks,
    #[command(description = "create a task")]
    Createtask,
    #[command(description = "daily report template")]
    Dailyreport,
    #[command(description = "your week in numbers")]
    Weeklyreport,
    #[command(description = "upcoming meetings")]
    Meetings,
    #[command(description = "schedule a meeting")]
    Schedulemeeting,
    #[command(description = "pending approvals")]
    Approvals,
    #[command(description = "approve a request by id")]
    Approve,
    #[command(description = "reject a request by id")]
    Reject,
    #[command(description = "ask for an approval")]
    Requestapproval,
    #[command(description = "your notifications")]
    Notifications,
    #[command(description = "upcoming reminders")]
    Reminders,
    #[command(description = "notification preferences")]
    Settings,
    #[command(description = "stop the current dialog")]
    Cancel,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token, invalid API URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match config::BOT_API_URL.as_deref() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Publishes the command menu
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
