//! Telegram-слой: команды, диалоги, клавиатуры и доставка

pub mod bot;
pub mod export;
pub mod handlers;
pub mod keyboards;
pub mod middleware;
pub mod notifications;
pub mod schema;
pub mod types;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError, PendingFlow};
