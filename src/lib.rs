//! Kassabot - корпоративный Telegram-бот для учёта сотрудников, сборов на
//! подарки и напоминаний.
//!
//! # Module Structure
//!
//! - `core`: конфигурация, ошибки, логирование, валидация ввода
//! - `storage`: SQLite-пул, миграции и запросы по сущностям
//! - `scheduler`: периодические проверки и диспетчер очереди уведомлений
//! - `telegram`: команды, диалоги, клавиатуры и доставка

pub mod cli;
pub mod core;
pub mod scheduler;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, HandlerDeps};
