//! Личные данные, уведомления, административные команды над пользователями.

use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::validation::format_date;
use crate::storage::db::get_connection;
use crate::storage::notifications::user_notifications;
use crate::storage::staff::staff_by_id;
use crate::storage::users::{self, Role};
use crate::telegram::bot::set_commands_for_roles;
use crate::telegram::middleware::{audit_action, current_user, require_any_role};
use crate::telegram::types::HandlerDeps;

/// /mydata: данные сотрудника и роли.
pub async fn handle_mydata(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    let roles = users::user_roles(&conn, user.id)?;
    let staff = match user.staff_id {
        Some(staff_id) => staff_by_id(&conn, staff_id)?,
        None => None,
    };
    drop(conn);

    let mut lines = vec!["👤 Ваши данные:".to_string()];
    match staff {
        Some(person) => {
            lines.push(format!("Имя: {}", person.first_name));
            lines.push(format!("Отчество: {}", person.patronymic));
            lines.push(format!("Табельный номер: {}", person.personnel_number));
            lines.push(format!("Дата рождения: {}", format_date(person.birthday)));
        }
        None => lines.push("Запись в справочнике сотрудников отсутствует.".to_string()),
    }
    if let Some(department) = &user.department {
        lines.push(format!("Подразделение: {department}"));
    }
    let role_names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
    lines.push(format!("Роли: {}", role_names.join(", ")));

    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}

/// /notifications: последние уведомления пользователя.
pub async fn handle_notifications(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    let notifications = user_notifications(&conn, user.id, false)?;
    drop(conn);

    if notifications.is_empty() {
        bot.send_message(msg.chat.id, "Уведомлений нет.").await?;
        return Ok(());
    }

    let mut lines = vec!["🔔 Последние уведомления:".to_string()];
    for notification in notifications.iter().take(10) {
        let marker = if notification.is_sent { "✓" } else { "⏳" };
        lines.push(format!(
            "{} {} — {} ({})",
            marker, notification.title, notification.message, notification.created_at
        ));
    }
    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}

/// /grant_role и /revoke_role (только суперадмин).
pub async fn handle_role_change(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    target_telegram_id: i64,
    role_name: &str,
    grant: bool,
) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Superadmin])?;

    let role = Role::parse(role_name)
        .ok_or_else(|| AppError::Validation(format!("Неизвестная роль: {role_name}. Роли: user, treasurer, admin, superadmin")))?;
    let target = users::get_user_by_telegram(&conn, target_telegram_id)?
        .ok_or(AppError::UserNotFound(target_telegram_id))?;

    let action = if grant { "grant_role" } else { "revoke_role" };
    audit_action(&conn, Some(user.id), &format!("{}:{}:{}", action, target.id, role.as_str()));

    if grant {
        users::grant_role(&conn, target.id, role)?;
    } else {
        users::revoke_role(&conn, target.id, role)?;
    }
    let target_roles = users::user_roles(&conn, target.id)?;
    drop(conn);

    // обновляем popup-меню целевого пользователя
    if let Err(e) = set_commands_for_roles(bot, target_telegram_id, &target_roles).await {
        log::warn!("Failed to refresh chat commands for {}: {}", target_telegram_id, e);
    }

    let verb = if grant { "выдана" } else { "снята" };
    bot.send_message(
        msg.chat.id,
        format!("✅ Роль {} {} пользователю {}.", role.as_str(), verb, target_telegram_id),
    )
    .await?;
    Ok(())
}

/// /deactivate <telegram_id> (только суперадмин).
pub async fn handle_deactivate(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    target_telegram_id: i64,
) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Superadmin])?;

    let target = users::get_user_by_telegram(&conn, target_telegram_id)?
        .ok_or(AppError::UserNotFound(target_telegram_id))?;
    audit_action(&conn, Some(user.id), &format!("deactivate:{}", target.id));
    users::deactivate_user(&conn, target.id)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Пользователь {target_telegram_id} деактивирован."),
    )
    .await?;
    Ok(())
}
