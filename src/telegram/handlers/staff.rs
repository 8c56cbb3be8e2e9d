//! Администрирование справочника сотрудников.

use chrono::Local;
use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::utils::{days_until_birthday, pluralize_days};
use crate::core::validation::{format_date, is_valid_personnel_number, parse_date};
use crate::storage::db::get_connection;
use crate::storage::staff;
use crate::storage::users::Role;
use crate::telegram::handlers::FlowOutcome;
use crate::telegram::middleware::{audit_action, current_user, require_any_role};
use crate::telegram::types::{HandlerDeps, PendingFlow};

/// /add_staff: запускает диалог добавления сотрудника.
pub async fn handle_add_staff(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "add_staff");
    drop(conn);

    bot.send_message(
        msg.chat.id,
        "Введите данные сотрудника в формате:\n\n\
         Табельный номер;Имя;Отчество;ДД.ММ.ГГГГ\n\n\
         Пример: 12345;Иван;Иванович;15.06.1990",
    )
    .await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::AddStaffData);
    Ok(())
}

/// Шаг диалога: разбор строки с данными сотрудника.
pub async fn process_add_staff_data(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let parts: Vec<&str> = text.split(';').map(str::trim).collect();
    let [number, first_name, patronymic, birthday_text] = parts.as_slice() else {
        return Err(AppError::Validation(
            "Неверный формат! Используйте: Табельный;Имя;Отчество;ДД.ММ.ГГГГ".to_string(),
        ));
    };

    if !is_valid_personnel_number(number) {
        return Err(AppError::Validation(
            "Табельный номер должен состоять из 5 цифр.".to_string(),
        ));
    }
    if first_name.is_empty() || patronymic.is_empty() {
        return Err(AppError::Validation("Имя и отчество не могут быть пустыми.".to_string()));
    }
    let birthday = parse_date(birthday_text)?;

    let conn = get_connection(&deps.db_pool)?;
    let created = staff::add_staff(&conn, number, first_name, patronymic, birthday)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Сотрудник {} добавлен (табельный {}).", created.display_name(), created.personnel_number),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

/// /remove_staff: запускает диалог удаления сотрудника.
pub async fn handle_remove_staff(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "remove_staff");
    drop(conn);

    bot.send_message(msg.chat.id, "Введите табельный номер сотрудника для удаления:")
        .await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::RemoveStaffNumber);
    Ok(())
}

/// Шаг диалога: удаление по табельному номеру.
pub async fn process_remove_staff_number(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let number = text.trim();
    let conn = get_connection(&deps.db_pool)?;
    staff::remove_staff(&conn, number)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Сотрудник с табельным номером {number} удалён."),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

/// /birthdays: именинники ближайших 30 дней.
pub async fn handle_birthdays(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let _user = current_user(&conn, msg.chat.id.0)?;

    let today = Local::now().date_naive();
    let mut upcoming: Vec<(i64, staff::Staff)> = staff::all_staff(&conn)?
        .into_iter()
        .map(|person| (days_until_birthday(person.birthday, today), person))
        .filter(|(days, _)| *days <= 30)
        .collect();
    drop(conn);
    upcoming.sort_by_key(|(days, _)| *days);

    if upcoming.is_empty() {
        bot.send_message(msg.chat.id, "В ближайшие 30 дней именинников нет.").await?;
        return Ok(());
    }

    let mut lines = vec!["🎂 Ближайшие именинники:".to_string()];
    for (days, person) in upcoming {
        let when = if days == 0 {
            "сегодня!".to_string()
        } else {
            format!("через {} {}", days, pluralize_days(days))
        };
        lines.push(format!(
            "{} — {} ({})",
            format_date(person.birthday),
            person.display_name(),
            when
        ));
    }
    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}
