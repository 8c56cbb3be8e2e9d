//! Хранилище: пул соединений, миграции и запросы по сущностям

pub mod audit;
pub mod db;
pub mod funds;
pub mod migrations;
pub mod notifications;
pub mod staff;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
