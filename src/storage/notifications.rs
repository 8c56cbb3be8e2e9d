use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::storage::db::fmt_datetime;

/// Категории уведомлений в очереди на отправку.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Birthday,
    Fund,
    Broadcast,
    System,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Birthday => "birthday",
            NotificationCategory::Fund => "fund",
            NotificationCategory::Broadcast => "broadcast",
            NotificationCategory::System => "system",
        }
    }

    pub fn parse(name: &str) -> Option<NotificationCategory> {
        match name {
            "birthday" => Some(NotificationCategory::Birthday),
            "fund" => Some(NotificationCategory::Fund),
            "broadcast" => Some(NotificationCategory::Broadcast),
            "system" => Some(NotificationCategory::System),
            _ => None,
        }
    }
}

/// Уведомление для пользователя (напоминания, рассылки).
///
/// Живёт в durable-очереди: планировщик создаёт записи, диспетчер отправки
/// помечает их отправленными. `scheduled_for = NULL` означает "к отправке
/// немедленно".
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub is_sent: bool,
    pub created_at: String,
    pub scheduled_for: Option<String>,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, category, is_sent, created_at, scheduled_for";

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let category_text: String = row.get(4)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        category: NotificationCategory::parse(&category_text).unwrap_or(NotificationCategory::System),
        is_sent: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        scheduled_for: row.get(7)?,
    })
}

/// Ставит уведомление в очередь на отправку.
///
/// # Arguments
///
/// * `user_id` - Получатель
/// * `title` - Заголовок
/// * `message` - Текст
/// * `category` - Категория уведомления
/// * `scheduled_for` - Время отправки; `None` = немедленно
///
/// # Returns
///
/// Возвращает идентификатор созданного уведомления.
pub fn enqueue(
    conn: &Connection,
    user_id: i64,
    title: &str,
    message: &str,
    category: NotificationCategory,
    scheduled_for: Option<NaiveDateTime>,
) -> AppResult<i64> {
    let scheduled_text = scheduled_for.map(fmt_datetime);
    conn.execute(
        "INSERT INTO notifications (user_id, title, message, category, scheduled_for)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &title as &dyn rusqlite::ToSql,
            &message as &dyn rusqlite::ToSql,
            &category.as_str() as &dyn rusqlite::ToSql,
            &scheduled_text as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Возвращает неотправленные уведомления, срок которых наступил.
pub fn pending_due(conn: &Connection, now: NaiveDateTime) -> AppResult<Vec<Notification>> {
    let now_text = fmt_datetime(now);
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE is_sent = 0 AND (scheduled_for IS NULL OR scheduled_for <= ?1)
         ORDER BY id"
    ))?;
    let rows = stmt.query_map(&[&now_text as &dyn rusqlite::ToSql], map_notification_row)?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}

/// Помечает уведомление отправленным. Повторная пометка - no-op.
pub fn mark_sent(conn: &Connection, notification_id: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE notifications SET is_sent = 1 WHERE id = ?1",
        &[&notification_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Возвращает уведомления пользователя, свежие сверху.
pub fn user_notifications(conn: &Connection, user_id: i64, unsent_only: bool) -> AppResult<Vec<Notification>> {
    let query = if unsent_only {
        format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 AND is_sent = 0 ORDER BY created_at DESC, id DESC"
        )
    } else {
        format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        )
    };
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(&[&user_id as &dyn rusqlite::ToSql], map_notification_row)?;

    let mut notifications = Vec::new();
    for row in rows {
        notifications.push(row?);
    }
    Ok(notifications)
}

/// Удаляет уведомления, созданные раньше `cutoff`, независимо от статуса
/// отправки.
///
/// # Returns
///
/// Возвращает количество удалённых записей.
pub fn purge_older_than(conn: &Connection, cutoff: NaiveDateTime) -> AppResult<usize> {
    let cutoff_text = fmt_datetime(cutoff);
    let count = conn.execute(
        "DELETE FROM notifications WHERE created_at < ?1",
        &[&cutoff_text as &dyn rusqlite::ToSql],
    )?;
    Ok(count)
}

/// Правило распределения рассылки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastAudience {
    /// Все активные пользователи
    All,
    /// Все, кроме сегодняшних именинников
    NoBirthday,
    /// Пользователи одного подразделения
    Department,
}

impl BroadcastAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastAudience::All => "all",
            BroadcastAudience::NoBirthday => "no_birthday",
            BroadcastAudience::Department => "department",
        }
    }

    pub fn parse(name: &str) -> Option<BroadcastAudience> {
        match name {
            "all" => Some(BroadcastAudience::All),
            "no_birthday" => Some(BroadcastAudience::NoBirthday),
            "department" => Some(BroadcastAudience::Department),
            _ => None,
        }
    }
}

/// Рассылка сообщений пользователям. После создания запись не меняется;
/// доставка идёт через порождённые уведомления.
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub id: i64,
    pub sender_id: i64,
    pub title: String,
    pub message: String,
    pub audience: BroadcastAudience,
    pub target_department: Option<String>,
    pub scheduled_for: Option<String>,
    pub created_at: String,
}

/// Создаёт запись рассылки.
pub fn create_broadcast(
    conn: &Connection,
    sender_id: i64,
    title: &str,
    message: &str,
    audience: BroadcastAudience,
    target_department: Option<&str>,
    scheduled_for: Option<NaiveDateTime>,
) -> AppResult<Broadcast> {
    if audience == BroadcastAudience::Department && target_department.is_none() {
        return Err(AppError::Validation(
            "Для рассылки по подразделению нужно указать подразделение".to_string(),
        ));
    }

    let scheduled_text = scheduled_for.map(fmt_datetime);
    conn.execute(
        "INSERT INTO broadcasts (sender_id, title, message, audience, target_department, scheduled_for)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            &sender_id as &dyn rusqlite::ToSql,
            &title as &dyn rusqlite::ToSql,
            &message as &dyn rusqlite::ToSql,
            &audience.as_str() as &dyn rusqlite::ToSql,
            &target_department as &dyn rusqlite::ToSql,
            &scheduled_text as &dyn rusqlite::ToSql,
        ],
    )?;
    let id = conn.last_insert_rowid();

    let created_at: String = conn.query_row(
        "SELECT created_at FROM broadcasts WHERE id = ?1",
        &[&id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;

    Ok(Broadcast {
        id,
        sender_id,
        title: title.to_string(),
        message: message.to_string(),
        audience,
        target_department: target_department.map(|s| s.to_string()),
        scheduled_for: scheduled_text,
        created_at,
    })
}

/// Разворачивает рассылку в уведомления: по одному на каждого подходящего
/// получателя. Время отправки рассылки переносится на уведомления, так что
/// доставкой планирует диспетчер очереди.
///
/// # Returns
///
/// Возвращает число созданных уведомлений.
pub fn expand_broadcast(conn: &Connection, broadcast: &Broadcast, today: NaiveDate) -> AppResult<usize> {
    let recipients = match broadcast.audience {
        BroadcastAudience::All => crate::storage::users::all_active_users(conn)?,
        BroadcastAudience::Department => {
            let department = broadcast.target_department.as_deref().unwrap_or_default();
            crate::storage::users::all_active_users(conn)?
                .into_iter()
                .filter(|u| u.department.as_deref() == Some(department))
                .collect()
        }
        BroadcastAudience::NoBirthday => {
            // Исключаем пользователей, у чьей записи справочника сегодня
            // день рождения (месяц и день, год не важен).
            let birthday_staff: Vec<i64> =
                crate::storage::staff::birthdays_on(conn, today.month(), today.day())?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
            crate::storage::users::all_active_users(conn)?
                .into_iter()
                .filter(|u| match u.staff_id {
                    Some(staff_id) => !birthday_staff.contains(&staff_id),
                    None => true,
                })
                .collect()
        }
    };

    let scheduled_for = broadcast
        .scheduled_for
        .as_deref()
        .and_then(crate::storage::db::parse_datetime);

    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    for user in &recipients {
        enqueue(
            &tx,
            user.id,
            &broadcast.title,
            &broadcast.message,
            NotificationCategory::Broadcast,
            scheduled_for,
        )?;
        count += 1;
    }
    tx.commit()?;

    Ok(count)
}
