//! Periodic check implementations.
//!
//! Every check reads the store, writes outbox rows and returns how many
//! notifications it produced. The checks are deliberately free of Telegram
//! types so they can be exercised in tests; only `dispatch_due` talks to
//! the Bot API. Duplicate notifications across runs are tolerated, not
//! prevented.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use teloxide::prelude::*;

use crate::core::error::AppResult;
use crate::core::utils::{days_until_birthday, pluralize_days};
use crate::core::validation::format_date;
use crate::storage::users::Role;
use crate::storage::{funds, notifications, staff, users};

/// Проверка предстоящих дней рождения.
///
/// Для каждого сотрудника справочника считает число дней до ближайшего
/// дня рождения; если оно в пределах `lookahead_days`, ставит уведомление
/// каждому действующему администратору и суперадминистратору.
///
/// # Returns
///
/// Возвращает количество созданных уведомлений.
pub fn birthday_check(conn: &Connection, today: NaiveDate, lookahead_days: i64) -> AppResult<usize> {
    let mut recipients = users::users_with_role(conn, Role::Admin)?;
    for superadmin in users::users_with_role(conn, Role::Superadmin)? {
        if !recipients.iter().any(|u| u.id == superadmin.id) {
            recipients.push(superadmin);
        }
    }
    if recipients.is_empty() {
        return Ok(0);
    }

    let mut created = 0;
    for person in staff::all_staff(conn)? {
        let days = days_until_birthday(person.birthday, today);
        if !(0..=lookahead_days).contains(&days) {
            continue;
        }

        let message = if days == 0 {
            format!(
                "🎂 Сегодня день рождения: {} ({})",
                person.display_name(),
                format_date(person.birthday)
            )
        } else {
            format!(
                "🎂 Через {} {} день рождения: {} ({})",
                days,
                pluralize_days(days),
                person.display_name(),
                format_date(person.birthday)
            )
        };

        for admin in &recipients {
            notifications::enqueue(
                conn,
                admin.id,
                "Предстоящий день рождения",
                &message,
                notifications::NotificationCategory::Birthday,
                None,
            )?;
            created += 1;
        }
    }

    Ok(created)
}

/// Проверка дедлайнов сборов.
///
/// По каждому открытому сбору с дедлайном в окне `window_days` ставит
/// уведомление его казначею (и только ему) с числом оставшихся дней.
pub fn fund_deadline_check(conn: &Connection, today: NaiveDate, window_days: i64) -> AppResult<usize> {
    let mut created = 0;
    for fund in funds::funds_near_deadline(conn, today, window_days)? {
        let days = (fund.deadline - today).num_days();
        let message = format!(
            "⏰ Через {} {} заканчивается сбор «{}» (№{})",
            days,
            pluralize_days(days),
            fund.title,
            fund.id
        );
        notifications::enqueue(
            conn,
            fund.treasurer_id,
            "Дедлайн сбора",
            &message,
            notifications::NotificationCategory::Fund,
            None,
        )?;
        created += 1;
    }
    Ok(created)
}

/// Напоминания неплательщикам.
///
/// По каждому открытому сбору ставит уведомление каждому активному
/// пользователю без взноса. Срабатывает каждый день, пока сбор открыт,
/// без подавления повторов. Сбор, исчезнувший между выборкой и обходом,
/// просто пропускается.
pub fn unpaid_reminder_check(conn: &Connection) -> AppResult<usize> {
    let mut created = 0;
    for fund in funds::active_funds(conn)? {
        let unpaid = match funds::unpaid_users(conn, fund.id) {
            Ok(unpaid) => unpaid,
            Err(crate::core::error::AppError::FundNotFound(_)) => continue,
            Err(e) => return Err(e),
        };
        for user in unpaid {
            notifications::enqueue(
                conn,
                user.id,
                "Напоминание о сборе",
                &format!("💸 Не забудьте внести средства в сбор «{}» (№{})", fund.title, fund.id),
                notifications::NotificationCategory::Fund,
                None,
            )?;
            created += 1;
        }
    }
    Ok(created)
}

/// Отправка готовых уведомлений из очереди.
///
/// Берёт неотправленные уведомления со сроком `<= now` и доставляет их.
/// Ошибка доставки одному получателю логируется и не прерывает остальных;
/// такое уведомление остаётся в очереди до следующего прохода. Уведомления
/// без адресата помечаются отправленными, чтобы не копиться вечно.
///
/// # Returns
///
/// Возвращает количество успешно отправленных уведомлений.
pub async fn dispatch_due(bot: &Bot, conn: &mut Connection, now: NaiveDateTime) -> AppResult<usize> {
    let due = notifications::pending_due(conn, now)?;
    if due.is_empty() {
        return Ok(0);
    }

    let mut sent = 0;
    for notification in due {
        let recipient = match users::get_user_by_id(conn, notification.user_id)? {
            Some(user) => user,
            None => {
                log::warn!(
                    "Notification {} has no recipient (user {}), dropping",
                    notification.id,
                    notification.user_id
                );
                notifications::mark_sent(conn, notification.id)?;
                continue;
            }
        };

        let text = format!("{}\n\n{}", notification.title, notification.message);
        if crate::telegram::notifications::send_text(bot, recipient.telegram_id, &text).await {
            notifications::mark_sent(conn, notification.id)?;
            sent += 1;
        }
    }

    Ok(sent)
}

/// Очистка устаревших уведомлений.
///
/// Удаляет записи старше `retention_days` независимо от статуса отправки.
pub fn purge_old_notifications(conn: &Connection, now: NaiveDateTime, retention_days: i64) -> AppResult<usize> {
    let cutoff = now - chrono::Duration::days(retention_days);
    let removed = notifications::purge_older_than(conn, cutoff)?;
    if removed > 0 {
        log::info!("Purged {} old notification(s)", removed);
    }
    Ok(removed)
}
