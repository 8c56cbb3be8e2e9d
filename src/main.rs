use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

use kassabot::cli::{Cli, Commands};
use kassabot::core::rate_limiter::RateLimiter;
use kassabot::core::{config, init_logger, log_startup_configuration};
use kassabot::scheduler::start_reminder_scheduler;
use kassabot::storage::notifications::purge_older_than;
use kassabot::storage::users::ensure_superadmin;
use kassabot::storage::{create_pool, get_connection};
use kassabot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Purge { days }) => run_purge(days),
        Some(Commands::Run) | None => run_bot().await,
    }
}

/// One-shot purge of old notifications.
fn run_purge(days: i64) -> Result<()> {
    let db_pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&db_pool)?;

    let cutoff = Utc::now().naive_utc() - chrono::Duration::days(days);
    let removed = purge_older_than(&conn, cutoff)?;
    log::info!("Purged {} notification(s) older than {} day(s)", removed, days);
    println!("Удалено уведомлений: {removed}");
    Ok(())
}

/// Run the Telegram bot with the reminder scheduler.
async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    log_startup_configuration();

    // Create database connection pool (runs migrations)
    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);

    // Seed the superadmin account from configuration
    {
        let conn = get_connection(&db_pool)?;
        if let Err(e) = ensure_superadmin(&conn, *config::SUPERADMIN_ID) {
            log::error!("Failed to ensure superadmin: {}", e);
        }
    }

    // Create bot instance
    let bot = create_bot()?;

    let bot_info = bot.get_me().await?;
    log::info!(
        "Bot username: {:?}, Bot ID: {}",
        bot_info.username.as_deref(),
        bot_info.id
    );

    // Default command list; personal per-role lists are set on /start
    setup_bot_commands(&bot).await?;

    // Start the reminder engine (daily checks + outbox dispatch)
    let scheduler = start_reminder_scheduler(bot.clone(), Arc::clone(&db_pool));

    let rate_limiter = Arc::new(RateLimiter::new());
    let deps = HandlerDeps::new(Arc::clone(&db_pool), rate_limiter);
    let handler = schema(deps);

    log::info!("Starting bot in long polling mode");
    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Stop scheduling future runs; in-flight work commits independently
    scheduler.stop();
    log::info!("Bot stopped");
    Ok(())
}
