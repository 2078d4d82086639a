use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tokio::time::interval;

use tasky::cli::{Cli, Commands};
use tasky::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};
use taskycore::core::{config, init_logger, log_startup_configuration};
use taskycore::{default_apps, Application, SessionStore, Store};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // .env must be loaded before the config statics are first read
    let _ = dotenv();
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command.unwrap_or(Commands::Run { webhook: false }) {
        Commands::Run { webhook } => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Commands::SetWebhook { url } => {
            let bot = create_bot()?;
            let full_url = config::webhook::full_url(&url);
            bot.set_webhook(url::Url::parse(&full_url)?).await?;
            log::info!("Webhook set to {}", full_url);
            Ok(())
        }
        Commands::DeleteWebhook => {
            let bot = create_bot()?;
            bot.delete_webhook().await?;
            log::info!("Webhook deleted");
            Ok(())
        }
        Commands::Migrate => {
            Store::open(&config::DATABASE_PATH)?;
            log::info!("Database at {} is up to date", *config::DATABASE_PATH);
            Ok(())
        }
    }
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    let started = std::time::Instant::now();
    log::info!("Starting bot...");
    log_startup_configuration();

    let store = Store::open(&config::DATABASE_PATH)?;
    let sessions = Arc::new(SessionStore::default());
    let app = Arc::new(Application::assemble(store, default_apps(), Arc::clone(&sessions)));
    start_session_sweeper(sessions);

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to publish the command menu: {}", e);
    }

    let handler = schema(HandlerDeps::new(app));
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    log::info!("================================================");
    log::info!("🎉 Bot initialization complete in {:.2}s", started.elapsed().as_secs_f64());
    log::info!("================================================");

    if use_webhook {
        let Some(base) = config::webhook::URL.as_deref() else {
            anyhow::bail!("--webhook needs WEBHOOK_URL to be set");
        };
        let url = url::Url::parse(&config::webhook::full_url(base))?;
        let addr: SocketAddr = ([0, 0, 0, 0], *config::webhook::PORT).into();
        log::info!("Starting bot in webhook mode at {} (listening on {})", url, addr);

        let listener = webhooks::axum(bot, webhooks::Options::new(addr, url)).await?;
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    } else {
        log::info!("Starting bot in long polling mode");
        let listener = Polling::builder(bot).drop_pending_updates().build();
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
    }

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

/// Drops idle conversations on a fixed interval
fn start_session_sweeper(sessions: Arc<SessionStore>) {
    tokio::spawn(async move {
        let mut ticker = interval(config::session::sweep_interval());
        loop {
            ticker.tick().await;
            let expired = sessions.sweep();
            if expired > 0 {
                log::info!("Session sweep dropped {} idle conversations", expired);
            }
        }
    });
}
