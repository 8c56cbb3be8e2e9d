//! Сборы: создание, взносы, статус, закрытие, напоминания, выгрузка.

use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::utils::pluralize_days;
use crate::core::validation::{format_date, is_valid_personnel_number, parse_amount, parse_date};
use crate::storage::db::get_connection;
use crate::storage::funds::{self, Fund, FundKind};
use crate::storage::notifications::{enqueue, NotificationCategory};
use crate::storage::users::{self, Role, User};
use crate::storage::staff;
use crate::telegram::export::build_fund_export;
use crate::telegram::handlers::FlowOutcome;
use crate::telegram::keyboards::{member_fund_menu, treasurer_fund_menu};
use crate::telegram::middleware::{
    audit_action, current_user, require_any_role, require_fund_treasurer, require_fund_treasurer_or_admin,
};
use crate::telegram::types::{HandlerDeps, PendingFlow};

fn fund_by_id(conn: &Connection, fund_id: i64) -> AppResult<Fund> {
    funds::get_fund(conn, fund_id)?.ok_or(AppError::FundNotFound(fund_id))
}

// ---------- Создание сбора на ДР ----------

/// /create_birthday_fund: запускает диалог создания сбора на день рождения.
pub async fn handle_create_birthday_fund(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "create_birthday_fund");
    drop(conn);

    bot.send_message(msg.chat.id, "Введите табельный номер именинника:").await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::BirthdayFundStaff);
    Ok(())
}

/// Шаг диалога: табельный номер именинника.
pub async fn process_birthday_fund_staff(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let number = text.trim();
    let conn = get_connection(&deps.db_pool)?;
    let person = staff::find_staff(&conn, number)?
        .ok_or_else(|| AppError::UnknownPersonnelNumber(number.to_string()))?;
    drop(conn);

    bot.send_message(msg.chat.id, "Введите дату дедлайна сбора в формате ДД.ММ.ГГГГ:")
        .await?;
    Ok(FlowOutcome::Next(PendingFlow::BirthdayFundDeadline { staff_id: person.id }))
}

/// Шаг диалога: дедлайн (общий для обоих типов сборов).
fn parse_deadline(text: &str, today: NaiveDate) -> AppResult<NaiveDate> {
    let deadline = parse_date(text)?;
    if deadline <= today {
        return Err(AppError::InvalidDeadline(deadline));
    }
    Ok(deadline)
}

pub async fn process_birthday_fund_deadline(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
    staff_id: i64,
) -> AppResult<FlowOutcome> {
    let deadline = parse_deadline(text, Local::now().date_naive())?;
    bot.send_message(msg.chat.id, "Введите табельный номер казначея сбора:").await?;
    Ok(FlowOutcome::Next(PendingFlow::BirthdayFundTreasurer { staff_id, deadline }))
}

/// Шаг диалога: казначей. Казначей должен быть зарегистрирован в боте.
fn resolve_treasurer(conn: &Connection, text: &str) -> AppResult<User> {
    let number = text.trim();
    if !is_valid_personnel_number(number) {
        return Err(AppError::Validation(
            "Табельный номер должен состоять из 5 цифр.".to_string(),
        ));
    }
    let person = staff::find_staff(conn, number)?
        .ok_or_else(|| AppError::UnknownPersonnelNumber(number.to_string()))?;
    users::get_user_by_staff(conn, person.id)?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Validation("Казначей должен быть зарегистрирован в боте.".to_string()))
}

pub async fn process_birthday_fund_treasurer(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    staff_id: i64,
    deadline: NaiveDate,
) -> AppResult<FlowOutcome> {
    let conn = get_connection(&deps.db_pool)?;
    let treasurer = resolve_treasurer(&conn, text)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!(
            "Введите целевую сумму сбора (рекомендуемая: {:.0}), либо «-», чтобы не задавать цель:",
            config::funds::DEFAULT_BIRTHDAY_FUND_AMOUNT
        ),
    )
    .await?;
    Ok(FlowOutcome::Next(PendingFlow::BirthdayFundAmount {
        staff_id,
        deadline,
        treasurer_id: treasurer.id,
    }))
}

fn parse_target_amount(text: &str) -> AppResult<Option<f64>> {
    let text = text.trim();
    if text == "-" {
        return Ok(None);
    }
    parse_amount(text).map(Some)
}

/// Финальный шаг: создание сбора на ДР.
pub async fn process_birthday_fund_amount(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    staff_id: i64,
    deadline: NaiveDate,
    treasurer_id: i64,
) -> AppResult<FlowOutcome> {
    let target = parse_target_amount(text)?;

    let mut conn = get_connection(&deps.db_pool)?;
    let person = staff::staff_by_id(&conn, staff_id)?
        .ok_or_else(|| AppError::Validation("Именинник больше не числится в справочнике.".to_string()))?;
    let title = format!("ДР: {}", person.display_name());

    let fund = funds::create_fund(
        &conn,
        FundKind::Birthday,
        &title,
        Some(staff_id),
        treasurer_id,
        deadline,
        target,
        Local::now().date_naive(),
    )?;
    finish_fund_creation(bot, msg, &mut conn, &fund, treasurer_id).await?;
    Ok(FlowOutcome::Done)
}

// ---------- Создание сбора на событие ----------

/// /create_event_fund: запускает диалог создания сбора на событие.
pub async fn handle_create_event_fund(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "create_event_fund");
    drop(conn);

    bot.send_message(msg.chat.id, "Введите название события:").await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::EventFundName);
    Ok(())
}

pub async fn process_event_fund_name(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let title = text.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Название события не может быть пустым.".to_string()));
    }
    bot.send_message(msg.chat.id, "Введите дату дедлайна сбора в формате ДД.ММ.ГГГГ:")
        .await?;
    Ok(FlowOutcome::Next(PendingFlow::EventFundDeadline { title: title.to_string() }))
}

pub async fn process_event_fund_deadline(
    bot: &Bot,
    msg: &Message,
    _deps: &HandlerDeps,
    text: &str,
    title: String,
) -> AppResult<FlowOutcome> {
    let deadline = parse_deadline(text, Local::now().date_naive())?;
    bot.send_message(msg.chat.id, "Введите табельный номер казначея сбора:").await?;
    Ok(FlowOutcome::Next(PendingFlow::EventFundTreasurer { title, deadline }))
}

pub async fn process_event_fund_treasurer(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    title: String,
    deadline: NaiveDate,
) -> AppResult<FlowOutcome> {
    let conn = get_connection(&deps.db_pool)?;
    let treasurer = resolve_treasurer(&conn, text)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!(
            "Введите целевую сумму сбора (рекомендуемая: {:.0}), либо «-», чтобы не задавать цель:",
            config::funds::DEFAULT_EVENT_FUND_AMOUNT
        ),
    )
    .await?;
    Ok(FlowOutcome::Next(PendingFlow::EventFundAmount {
        title,
        deadline,
        treasurer_id: treasurer.id,
    }))
}

pub async fn process_event_fund_amount(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    title: String,
    deadline: NaiveDate,
    treasurer_id: i64,
) -> AppResult<FlowOutcome> {
    let target = parse_target_amount(text)?;

    let mut conn = get_connection(&deps.db_pool)?;
    let fund = funds::create_fund(
        &conn,
        FundKind::Event,
        &title,
        None,
        treasurer_id,
        deadline,
        target,
        Local::now().date_naive(),
    )?;
    finish_fund_creation(bot, msg, &mut conn, &fund, treasurer_id).await?;
    Ok(FlowOutcome::Done)
}

/// Общий финал создания: роль казначея, уведомление, ответ создателю.
async fn finish_fund_creation(
    bot: &Bot,
    msg: &Message,
    conn: &mut Connection,
    fund: &Fund,
    treasurer_id: i64,
) -> AppResult<()> {
    // Казначейство привязано к сбору; роль даёт доступ к казначейским
    // командам в меню.
    users::grant_role(conn, treasurer_id, Role::Treasurer)?;
    enqueue(
        conn,
        treasurer_id,
        "Назначение казначеем",
        &format!("Вы назначены казначеем сбора «{}» (№{}).", fund.title, fund.id),
        NotificationCategory::System,
        None,
    )?;

    bot.send_message(
        msg.chat.id,
        format!(
            "✅ Сбор №{} «{}» создан. Дедлайн: {}.",
            fund.id,
            fund.title,
            format_date(fund.deadline)
        ),
    )
    .reply_markup(treasurer_fund_menu(fund.id))
    .await?;
    Ok(())
}

// ---------- Назначение казначея ----------

/// /assign_treasurer: выдаёт роль казначея по табельному номеру.
pub async fn handle_assign_treasurer(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    require_any_role(&conn, &user, &[Role::Admin, Role::Superadmin])?;
    audit_action(&conn, Some(user.id), "assign_treasurer");
    drop(conn);

    bot.send_message(msg.chat.id, "Введите табельный номер будущего казначея:")
        .await?;
    deps.flows.insert(msg.chat.id.0, PendingFlow::AssignTreasurerNumber);
    Ok(())
}

/// Шаг диалога: выдача роли казначея.
pub async fn process_assign_treasurer(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let conn = get_connection(&deps.db_pool)?;
    let treasurer = resolve_treasurer(&conn, text)?;
    users::grant_role(&conn, treasurer.id, Role::Treasurer)?;
    let roles = users::user_roles(&conn, treasurer.id)?;
    drop(conn);

    if let Err(e) = crate::telegram::bot::set_commands_for_roles(bot, treasurer.telegram_id, &roles).await {
        log::warn!("Failed to refresh chat commands for {}: {}", treasurer.telegram_id, e);
    }
    bot.send_message(
        msg.chat.id,
        format!("✅ Пользователю {} выдана роль казначея.", treasurer.telegram_id),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

// ---------- Взносы ----------

/// /add_donation <id>: запускает диалог ввода суммы.
pub async fn handle_add_donation(bot: &Bot, msg: &Message, deps: &HandlerDeps, fund_id: i64) -> AppResult<()> {
    let mut conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    start_donation_flow(bot, &mut conn, deps, msg.chat.id.0, &user, fund_id).await
}

/// Общая часть команды и callback-кнопки «Внести взнос».
pub async fn start_donation_flow(
    bot: &Bot,
    conn: &mut Connection,
    deps: &HandlerDeps,
    chat_id: i64,
    user: &User,
    fund_id: i64,
) -> AppResult<()> {
    let fund = fund_by_id(conn, fund_id)?;
    if fund.is_closed {
        return Err(AppError::FundClosed(fund_id));
    }
    audit_action(conn, Some(user.id), &format!("add_donation:{fund_id}"));

    bot.send_message(ChatId(chat_id), format!("Введите сумму взноса в сбор «{}»:", fund.title))
        .await?;
    deps.flows.insert(chat_id, PendingFlow::DonationAmount { fund_id });
    Ok(())
}

/// Шаг диалога: сумма взноса.
pub async fn process_donation_amount(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    fund_id: i64,
) -> AppResult<FlowOutcome> {
    let amount = parse_amount(text)?;

    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    funds::add_donation(&conn, fund_id, user.id, amount)?;
    let fund = fund_by_id(&conn, fund_id)?;
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Взнос {:.2} учтён. Всего собрано: {:.2}.", amount, fund.collected_amount),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

// ---------- Статус ----------

/// /fund_status <id>
pub async fn handle_fund_status(bot: &Bot, msg: &Message, deps: &HandlerDeps, fund_id: i64) -> AppResult<()> {
    let mut conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    send_fund_status(bot, &mut conn, msg.chat.id.0, &user, fund_id).await
}

/// Отправляет сводку по сбору с подходящей клавиатурой.
pub async fn send_fund_status(
    bot: &Bot,
    conn: &mut Connection,
    chat_id: i64,
    user: &User,
    fund_id: i64,
) -> AppResult<()> {
    let today = Local::now().date_naive();
    let status = funds::fund_status(conn, fund_id, today)?;
    let fund = fund_by_id(conn, fund_id)?;

    let mut lines = vec![format!("📊 Сбор №{}: {}", status.fund_id, status.title)];
    lines.push(format!("Собрано: {:.2}", status.collected_amount));
    if let Some(target) = status.target_amount {
        lines.push(format!("Цель: {:.2}", target));
        match status.remaining {
            Some(remaining) if remaining > 0.0 => lines.push(format!("Осталось собрать: {:.2}", remaining)),
            Some(remaining) if remaining < 0.0 => {
                lines.push(format!("Перевыполнение: {:.2}", -remaining));
            }
            _ => lines.push("Цель достигнута.".to_string()),
        }
    }
    lines.push(format!("Вкладчиков: {}", status.donors_count));
    if status.is_closed {
        lines.push("Статус: закрыт".to_string());
    } else if status.days_left < 0 {
        lines.push(format!(
            "Дедлайн прошёл {} {} назад, сбор ещё открыт",
            -status.days_left,
            pluralize_days(-status.days_left)
        ));
    } else {
        lines.push(format!(
            "До дедлайна: {} {}",
            status.days_left,
            pluralize_days(status.days_left)
        ));
    }

    let markup = if fund.treasurer_id == user.id {
        treasurer_fund_menu(fund_id)
    } else {
        member_fund_menu(fund_id)
    };
    bot.send_message(ChatId(chat_id), lines.join("\n"))
        .reply_markup(markup)
        .await?;
    Ok(())
}

// ---------- Закрытие ----------

/// /close_fund <id>: закрывает сбор (казначей или администратор).
pub async fn handle_close_fund(bot: &Bot, msg: &Message, deps: &HandlerDeps, fund_id: i64) -> AppResult<()> {
    let mut conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    do_close_fund(bot, &mut conn, msg.chat.id.0, &user, fund_id).await
}

pub async fn do_close_fund(bot: &Bot, conn: &mut Connection, chat_id: i64, user: &User, fund_id: i64) -> AppResult<()> {
    let fund = fund_by_id(conn, fund_id)?;
    require_fund_treasurer_or_admin(conn, &fund, user)?;
    audit_action(conn, Some(user.id), &format!("close_fund:{fund_id}"));

    let already_closed = fund.is_closed;
    funds::close_fund(conn, fund_id)?;

    let text = if already_closed {
        format!("⚠️ Сбор №{fund_id} уже был закрыт.")
    } else {
        format!("✅ Сбор №{} «{}» закрыт. Итог: {:.2}.", fund.id, fund.title, fund.collected_amount)
    };
    bot.send_message(ChatId(chat_id), text).await?;
    Ok(())
}

// ---------- Напоминание должникам ----------

/// /remind_fund <id>: запускает диалог текста напоминания.
pub async fn handle_remind_fund(bot: &Bot, msg: &Message, deps: &HandlerDeps, fund_id: i64) -> AppResult<()> {
    let mut conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    start_remind_flow(bot, &mut conn, deps, msg.chat.id.0, &user, fund_id).await
}

pub async fn start_remind_flow(
    bot: &Bot,
    conn: &mut Connection,
    deps: &HandlerDeps,
    chat_id: i64,
    user: &User,
    fund_id: i64,
) -> AppResult<()> {
    let fund = fund_by_id(conn, fund_id)?;
    if fund.is_closed {
        return Err(AppError::FundClosed(fund_id));
    }
    require_fund_treasurer(&fund, user)?;
    audit_action(conn, Some(user.id), &format!("remind_fund:{fund_id}"));

    bot.send_message(ChatId(chat_id), "Введите текст напоминания:").await?;
    deps.flows.insert(chat_id, PendingFlow::FundReminderText { fund_id });
    Ok(())
}

/// Шаг диалога: текст напоминания. Ставит уведомление каждому должнику;
/// именинник сбора в список не попадает.
pub async fn process_fund_reminder_text(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
    fund_id: i64,
) -> AppResult<FlowOutcome> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Текст напоминания не может быть пустым.".to_string()));
    }

    let conn = get_connection(&deps.db_pool)?;
    let fund = fund_by_id(&conn, fund_id)?;
    let unpaid = funds::unpaid_users(&conn, fund_id)?;

    let message = format!("💸 Напоминание от казначея сбора «{}»:\n\n{}", fund.title, text);
    let mut count = 0;
    for user in &unpaid {
        enqueue(&conn, user.id, "Напоминание о сборе", &message, NotificationCategory::Fund, None)?;
        count += 1;
    }
    drop(conn);

    bot.send_message(
        msg.chat.id,
        format!("✅ Напоминание поставлено в очередь. Получателей: {count}."),
    )
    .await?;
    Ok(FlowOutcome::Done)
}

// ---------- Выгрузка ----------

/// /export_fund <id>: JSON-выгрузка статуса и взносов.
pub async fn handle_export_fund(bot: &Bot, msg: &Message, deps: &HandlerDeps, fund_id: i64) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    let fund = fund_by_id(&conn, fund_id)?;
    require_fund_treasurer_or_admin(&conn, &fund, &user)?;
    audit_action(&conn, Some(user.id), &format!("export_fund:{fund_id}"));

    let (file_name, body) = build_fund_export(&conn, fund_id, Local::now().date_naive())?;
    drop(conn);

    bot.send_document(msg.chat.id, InputFile::memory(body).file_name(file_name))
        .await?;
    Ok(())
}

// ---------- Списки ----------

/// /active_funds: все открытые сборы.
pub async fn handle_active_funds(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let _user = current_user(&conn, msg.chat.id.0)?;
    let funds = funds::active_funds(&conn)?;
    drop(conn);

    if funds.is_empty() {
        bot.send_message(msg.chat.id, "Активных сборов нет.").await?;
        return Ok(());
    }

    let mut lines = vec!["📋 Активные сборы:".to_string()];
    for fund in funds {
        lines.push(format!(
            "№{} «{}» — до {}, собрано {:.2}",
            fund.id,
            fund.title,
            format_date(fund.deadline),
            fund.collected_amount
        ));
    }
    lines.push("\nСтатус сбора: /fund_status <id>, взнос: /add_donation <id>".to_string());
    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}

/// /my_donations: взносы пользователя.
pub async fn handle_my_donations(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, msg.chat.id.0)?;
    let donations = funds::user_donations(&conn, user.id)?;
    drop(conn);

    if donations.is_empty() {
        bot.send_message(msg.chat.id, "У вас пока нет взносов.").await?;
        return Ok(());
    }

    let mut lines = vec!["💰 Мои взносы:".to_string()];
    let mut total = 0.0;
    for record in &donations {
        let title = record.fund_title.as_deref().unwrap_or("(сбор удалён)");
        lines.push(format!("{:.2} — «{}» ({})", record.amount, title, record.donated_at));
        total += record.amount;
    }
    lines.push(format!("Итого: {total:.2}"));
    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}
