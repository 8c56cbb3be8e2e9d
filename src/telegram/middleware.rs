//! Явная цепочка проверок вокруг каждого хендлера.
//!
//! Порядок всегда один: соединение из пула -> проверка регистрации ->
//! проверка роли -> запись в журнал -> тело хендлера. Функции ничего не
//! отправляют в чат сами: ошибка доступа поднимается как `AppError`, и
//! диспетчер показывает её текст пользователю.

use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::storage::funds::Fund;
use crate::storage::users::{self, Role, User};
use crate::storage::audit;

/// Проверка регистрации: возвращает активного пользователя чата.
///
/// # Errors
///
/// `NotRegistered`, если чат не зарегистрирован или пользователь
/// деактивирован.
pub fn current_user(conn: &Connection, chat_id: i64) -> AppResult<User> {
    match users::get_user_by_telegram(conn, chat_id)? {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AppError::NotRegistered),
    }
}

/// Проверка роли: хотя бы одна из перечисленных.
pub fn require_any_role(conn: &Connection, user: &User, roles: &[Role]) -> AppResult<()> {
    for role in roles {
        if users::has_role(conn, user.id, *role)? {
            return Ok(());
        }
    }
    let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    Err(AppError::AccessDenied(format!("requires one of: {}", names.join(", "))))
}

/// Проверка казначейства: пользователь должен быть казначеем именно этого
/// сбора. Роли здесь не участвуют - принадлежность сбора важнее иерархии.
pub fn require_fund_treasurer(fund: &Fund, user: &User) -> AppResult<()> {
    if fund.treasurer_id == user.id {
        Ok(())
    } else {
        Err(AppError::AccessDenied(format!("not the treasurer of fund {}", fund.id)))
    }
}

/// Казначей сбора либо администратор (для закрытия и выгрузки).
pub fn require_fund_treasurer_or_admin(conn: &Connection, fund: &Fund, user: &User) -> AppResult<()> {
    if fund.treasurer_id == user.id {
        return Ok(());
    }
    require_any_role(conn, user, &[Role::Admin, Role::Superadmin])
        .map_err(|_| AppError::AccessDenied(format!("not the treasurer of fund {}", fund.id)))
}

/// Запись действия в журнал. Сбой журнала не прерывает хендлер.
pub fn audit_action(conn: &Connection, user_id: Option<i64>, action: &str) {
    if let Err(e) = audit::log_action(conn, user_id, action) {
        log::warn!("Failed to audit action '{}': {}", action, e);
    }
}
