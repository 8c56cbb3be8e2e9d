use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};

/// Роли пользователей в системе.
///
/// Набор закрытый, иерархии нет: `Admin` не получает прав казначея на
/// чужих сборах - принадлежность сбора проверяется по полю `treasurer_id`
/// самого сбора.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Treasurer,
    Admin,
    Superadmin,
}

impl Role {
    /// Все роли в порядке возрастания полномочий.
    pub const ALL: [Role; 4] = [Role::User, Role::Treasurer, Role::Admin, Role::Superadmin];

    /// Имя роли, как оно хранится в таблице user_roles.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Treasurer => "treasurer",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Разбирает имя роли; `None` для неизвестных имён.
    pub fn parse(name: &str) -> Option<Role> {
        match name.trim() {
            "user" => Some(Role::User),
            "treasurer" => Some(Role::Treasurer),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::Superadmin),
            _ => None,
        }
    }
}

/// Структура, представляющая зарегистрированного пользователя бота.
#[derive(Debug, Clone)]
pub struct User {
    /// Внутренний идентификатор
    pub id: i64,
    /// Telegram ID пользователя
    pub telegram_id: i64,
    /// Имя пользователя (username) в Telegram, если доступно
    pub username: Option<String>,
    /// Ссылка на запись справочника сотрудников (максимум одна)
    pub staff_id: Option<i64>,
    /// Подразделение (для адресных рассылок)
    pub department: Option<String>,
    /// Флаг активности: деактивированные не участвуют в сборах и рассылках
    pub is_active: bool,
    /// Дата создания записи
    pub created_at: String,
}

const USER_COLUMNS: &str = "id, telegram_id, username, staff_id, department, is_active, created_at";

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        staff_id: row.get(3)?,
        department: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

/// Регистрирует пользователя по табельному номеру.
///
/// Проверка и вставка выполняются в одной транзакции; уникальные индексы
/// на `telegram_id` и `staff_id` страхуют от конкурентной регистрации того
/// же номера. Новому пользователю выдаётся роль `user`.
///
/// # Errors
///
/// * `UnknownPersonnelNumber` - табельный номер не числится в справочнике
/// * `AlreadyRegistered` - chat уже зарегистрирован либо сотрудник уже
///   привязан к другому пользователю
pub fn register_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    personnel_number: &str,
) -> AppResult<User> {
    let tx = conn.unchecked_transaction()?;

    let staff = match crate::storage::staff::find_staff(&tx, personnel_number)? {
        Some(staff) => staff,
        None => return Err(AppError::UnknownPersonnelNumber(personnel_number.to_string())),
    };

    if get_user_by_telegram(&tx, telegram_id)?.is_some() {
        return Err(AppError::AlreadyRegistered(telegram_id));
    }
    if get_user_by_staff(&tx, staff.id)?.is_some() {
        return Err(AppError::AlreadyRegistered(telegram_id));
    }

    let result = tx.execute(
        "INSERT INTO users (telegram_id, username, staff_id) VALUES (?1, ?2, ?3)",
        &[
            &telegram_id as &dyn rusqlite::ToSql,
            &username as &dyn rusqlite::ToSql,
            &staff.id as &dyn rusqlite::ToSql,
        ],
    );
    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            return Err(AppError::AlreadyRegistered(telegram_id));
        }
        Err(e) => return Err(e.into()),
    }

    let user_id = tx.last_insert_rowid();
    tx.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        &[&user_id as &dyn rusqlite::ToSql, &Role::User.as_str() as &dyn rusqlite::ToSql],
    )?;

    tx.commit()?;

    get_user_by_id(conn, user_id)?.ok_or(AppError::UserNotFound(user_id))
}

/// Получает пользователя по Telegram ID.
pub fn get_user_by_telegram(conn: &Connection, telegram_id: i64) -> AppResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1"))?;
    let mut rows = stmt.query(&[&telegram_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_user_row(row)?))
    } else {
        Ok(None)
    }
}

/// Получает пользователя по внутреннему идентификатору.
pub fn get_user_by_id(conn: &Connection, id: i64) -> AppResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
    let mut rows = stmt.query(&[&id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_user_row(row)?))
    } else {
        Ok(None)
    }
}

/// Получает пользователя, привязанного к записи справочника.
pub fn get_user_by_staff(conn: &Connection, staff_id: i64) -> AppResult<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE staff_id = ?1"))?;
    let mut rows = stmt.query(&[&staff_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_user_row(row)?))
    } else {
        Ok(None)
    }
}

/// Возвращает всех активных пользователей.
pub fn all_active_users(conn: &Connection) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_active = 1 ORDER BY id"
    ))?;
    let rows = stmt.query_map([], map_user_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Деактивирует пользователя. Записи не удаляются.
///
/// # Returns
///
/// Возвращает `true`, если пользователь существовал.
pub fn deactivate_user(conn: &Connection, user_id: i64) -> AppResult<bool> {
    let rows = conn.execute(
        "UPDATE users SET is_active = 0 WHERE id = ?1",
        &[&user_id as &dyn rusqlite::ToSql],
    )?;
    Ok(rows > 0)
}

/// Выдаёт роль пользователю. Повторная выдача уже имеющейся роли - no-op.
pub fn grant_role(conn: &Connection, user_id: i64, role: Role) -> AppResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        &[&user_id as &dyn rusqlite::ToSql, &role.as_str() as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Снимает роль с пользователя. Снятие отсутствующей роли - no-op.
pub fn revoke_role(conn: &Connection, user_id: i64, role: Role) -> AppResult<()> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1 AND role = ?2",
        &[&user_id as &dyn rusqlite::ToSql, &role.as_str() as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Возвращает список ролей пользователя.
pub fn user_roles(conn: &Connection, user_id: i64) -> AppResult<Vec<Role>> {
    let mut stmt = conn.prepare("SELECT role FROM user_roles WHERE user_id = ?1 ORDER BY role")?;
    let rows = stmt.query_map(&[&user_id as &dyn rusqlite::ToSql], |row| row.get::<_, String>(0))?;

    let mut roles = Vec::new();
    for row in rows {
        if let Some(role) = Role::parse(&row?) {
            roles.push(role);
        }
    }
    Ok(roles)
}

/// Проверяет наличие роли у пользователя.
pub fn has_role(conn: &Connection, user_id: i64, role: Role) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_roles WHERE user_id = ?1 AND role = ?2",
        &[&user_id as &dyn rusqlite::ToSql, &role.as_str() as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Возвращает активных пользователей с указанной ролью.
pub fn users_with_role(conn: &Connection, role: Role) -> AppResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         JOIN user_roles ON user_roles.user_id = users.id
         WHERE user_roles.role = ?1 AND users.is_active = 1
         ORDER BY users.id"
    ))?;
    let rows = stmt.query_map(&[&role.as_str() as &dyn rusqlite::ToSql], map_user_row)?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Явная структура частичного обновления пользователя.
///
/// Перечисляет единственные изменяемые поля; поле `None` не трогается.
#[derive(Debug, Default, Clone)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

/// Обновляет перечисленные в `UserUpdate` поля пользователя.
///
/// # Returns
///
/// Возвращает `true`, если запись существовала и была обновлена.
pub fn update_user(conn: &Connection, user_id: i64, update: &UserUpdate) -> AppResult<bool> {
    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(ref username) = update.username {
        updates.push("username = ?");
        params.push(Box::new(username.clone()));
    }
    if let Some(ref department) = update.department {
        updates.push("department = ?");
        params.push(Box::new(department.clone()));
    }
    if let Some(is_active) = update.is_active {
        updates.push("is_active = ?");
        params.push(Box::new(if is_active { 1i64 } else { 0i64 }));
    }

    if updates.is_empty() {
        return Ok(get_user_by_id(conn, user_id)?.is_some());
    }

    let query = format!("UPDATE users SET {} WHERE id = ?", updates.join(", "));
    params.push(Box::new(user_id));

    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = conn.execute(&query, params_refs.as_slice())?;
    Ok(rows > 0)
}

/// Создаёт (или дополняет ролями) учётную запись суперадминистратора.
///
/// Вызывается при старте с Telegram ID из конфигурации; `telegram_id = 0`
/// означает, что суперадмин не настроен.
pub fn ensure_superadmin(conn: &Connection, telegram_id: i64) -> AppResult<()> {
    if telegram_id == 0 {
        return Ok(());
    }

    let user_id = match get_user_by_telegram(conn, telegram_id)? {
        Some(user) => user.id,
        None => {
            conn.execute(
                "INSERT INTO users (telegram_id, username, staff_id) VALUES (?1, NULL, NULL)",
                &[&telegram_id as &dyn rusqlite::ToSql],
            )?;
            let id = conn.last_insert_rowid();
            log::info!("Created superadmin user with telegram id {}", telegram_id);
            id
        }
    };

    grant_role(conn, user_id, Role::User)?;
    grant_role(conn, user_id, Role::Superadmin)?;
    Ok(())
}
