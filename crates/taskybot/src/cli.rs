use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tasky")]
#[command(author, version, about = "Telegram bot for team projects, tasks, meetings and approvals", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Register a webhook URL with Telegram
    SetWebhook {
        /// Public base URL, e.g. https://bot.example.com
        url: String,
    },

    /// Remove the registered webhook and return to long polling
    DeleteWebhook,

    /// Create or upgrade the database schema and exit
    Migrate,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
