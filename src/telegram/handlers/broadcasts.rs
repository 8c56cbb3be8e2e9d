//! Рассылки и отложенные объявления.

use chrono::{Local, TimeZone, Utc};
use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::validation::parse_schedule;
use crate::storage::db::get_connection;
use crate::storage::notifications::{create_broadcast, expand_broadcast, BroadcastAudience};
use crate::storage::users::Role;
use crate::telegram::handlers::FlowOutcome;
use crate::telegram::middleware::{audit_action, current_user, require_any_role};
use crate::telegram::types::{HandlerDeps, PendingFlow};

/// /broadcast, /birthday_broadcast, /department_broadcast: запуск диалога
/// рассылки с выбранным правилом распределения.
pub async fn handle_broadcast_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    audience: BroadcastAudience,
) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), &format!("broadcast:{}", audience.as_str()));
    drop(conn);

    if audience == BroadcastAudience::Department {
        bot.send_message(msg.chat.id, "Введите название подразделения:").await?;
        deps.flows.insert(msg.chat.id.0, PendingFlow::BroadcastDepartment);
    } else {
        bot.send_message(msg.chat.id, "Введите заголовок рассылки:").await?;
        deps.flows.insert(
            msg.chat.id.0,
            PendingFlow::BroadcastTitle {
                audience,
                department: None,
            },
        );
    }
    Ok(())
}

/// Шаг диалога: подразделение для адресной рассылки.
pub async fn process_broadcast_department(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let department = text.trim();
    if department.is_empty() {
        return Err(AppError::Validation("Название подразделения не может быть пустым.".to_string()));
    }
    bot.send_message(msg.chat.id, "Введите заголовок рассылки:").await?;
    Ok(FlowOutcome::Next(PendingFlow::BroadcastTitle {
        audience: BroadcastAudience::Department,
        department: Some(department.to_string()),
    }))
}

/// Шаг диалога: заголовок рассылки.
pub async fn process_broadcast_title(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
    audience: BroadcastAudience,
    department: Option<String>,
) -> AppResult<FlowOutcome> {
    let title = text.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Заголовок не может быть пустым.".to_string()));
    }
    bot.send_message(msg.chat.id, "Введите текст рассылки:").await?;
    Ok(FlowOutcome::Next(PendingFlow::BroadcastMessage {
        audience,
        department,
        title: title.to_string(),
    }))
}

/// Финальный шаг: создание и немедленное разворачивание рассылки.
pub async fn process_broadcast_message(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    audience: BroadcastAudience,
    department: Option<String>,
    title: String,
) -> AppResult<FlowOutcome> {
    let body = text.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Текст рассылки не может быть пустым.".to_string()));
    }

    let conn = get_connection(&deps.db_pool)?;
    let sender = current_user(&conn, msg.chat.id.0)?;
    let broadcast = create_broadcast(&conn, sender.id, &title, body, audience, department.as_deref(), None)?;
    let count = expand_broadcast(&conn, &broadcast, Local::now().date_naive())?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Рассылка создана. Уведомлений в очереди: {count}."),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

// ---------- Отложенное объявление ----------

/// /announcement: объявление всем с отложенной отправкой.
pub async fn handle_announcement(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "announcement");
    drop(conn);

    bot.send_message(msg.chat.id, "Введите заголовок объявления:").await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::AnnouncementTitle);
    Ok(())
}

pub async fn process_announcement_title(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let title = text.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Заголовок не может быть пустым.".to_string()));
    }
    bot.send_message(msg.chat.id, "Введите текст объявления:").await?;
    Ok(FlowOutcome::Next(PendingFlow::AnnouncementMessage { title: title.to_string() }))
}

pub async fn process_announcement_message(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
    title: String,
) -> AppResult<FlowOutcome> {
    let body = text.trim();
    if body.is_empty() {
        return Err(AppError::Validation("Текст объявления не может быть пустым.".to_string()));
    }
    bot.send_message(
        msg.chat.id,
        "Введите время отправки в формате ДД.ММ.ГГГГ ЧЧ:ММ:",
    )
    .await?;
    Ok(FlowOutcome::Next(PendingFlow::AnnouncementSchedule {
        title,
        message: body.to_string(),
    }))
}

/// Финальный шаг: создание отложенной рассылки. Уведомления создаются
/// сразу, время отправки контролирует диспетчер очереди.
pub async fn process_announcement_schedule(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    title: String,
    message: String,
) -> AppResult<FlowOutcome> {
    let local_naive = parse_schedule(text)?;
    let local = Local
        .from_local_datetime(&local_naive)
        .earliest()
        .ok_or_else(|| AppError::InvalidDate(text.trim().to_string()))?;
    let scheduled_utc = local.with_timezone(&Utc).naive_utc();

    if scheduled_utc <= Utc::now().naive_utc() {
        return Err(AppError::Validation("Время отправки уже прошло.".to_string()));
    }

    let conn = get_connection(&deps.db_pool)?;
    let sender = current_user(&conn, msg.chat.id.0)?;
    let broadcast = create_broadcast(
        &conn,
        sender.id,
        &title,
        &message,
        BroadcastAudience::All,
        None,
        Some(scheduled_utc),
    )?;
    let count = expand_broadcast(&conn, &broadcast, Local::now().date_naive())?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!(
            "✅ Объявление запланировано на {}. Получателей: {count}.",
            local.format("%d.%m.%Y %H:%M")
        ),
    )
    .await?;
    Ok(FlowOutcome::Done)
}
