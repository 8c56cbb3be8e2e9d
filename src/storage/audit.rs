use rusqlite::Connection;

use crate::core::error::AppResult;

/// Записывает действие пользователя в журнал.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `user_id` - Внутренний ID пользователя; `None` для незарегистрированных
/// * `action` - Описание действия
pub fn log_action(conn: &Connection, user_id: Option<i64>, action: &str) -> AppResult<()> {
    conn.execute(
        "INSERT INTO logs (user_id, action) VALUES (?1, ?2)",
        &[&user_id as &dyn rusqlite::ToSql, &action as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}
