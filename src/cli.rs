//! Аргументы командной строки.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kassabot", about = "Корпоративный Telegram-бот: сотрудники, сборы, напоминания", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Запустить бота с планировщиком напоминаний (режим по умолчанию)
    Run,
    /// Удалить уведомления старше N дней и выйти
    Purge {
        /// Возраст уведомлений в днях
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
