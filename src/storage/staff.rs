use chrono::NaiveDate;
use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};

/// Структура, представляющая сотрудника из справочника.
///
/// Запись справочника не зависит от регистрации в боте: сотрудник может
/// никогда не зарегистрироваться, а зарегистрированный пользователь
/// ссылается максимум на одну запись.
#[derive(Debug, Clone)]
pub struct Staff {
    /// Внутренний идентификатор записи
    pub id: i64,
    /// Табельный номер (уникальный, внешний идентификатор)
    pub personnel_number: String,
    /// Имя сотрудника
    pub first_name: String,
    /// Отчество сотрудника
    pub patronymic: String,
    /// Дата рождения
    pub birthday: NaiveDate,
}

impl Staff {
    /// Имя и отчество для отображения в сообщениях.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.patronymic)
    }
}

fn map_staff_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Staff> {
    Ok(Staff {
        id: row.get(0)?,
        personnel_number: row.get(1)?,
        first_name: row.get(2)?,
        patronymic: row.get(3)?,
        birthday: row.get(4)?,
    })
}

const STAFF_COLUMNS: &str = "id, personnel_number, first_name, patronymic, birthday";

/// Добавляет сотрудника в справочник.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `personnel_number` - Табельный номер (уникальный)
/// * `first_name` - Имя
/// * `patronymic` - Отчество
/// * `birthday` - Дата рождения
///
/// # Errors
///
/// Возвращает `StaffExists`, если табельный номер уже занят. Уникальный
/// индекс в схеме страхует проверку при конкурентной вставке.
pub fn add_staff(
    conn: &Connection,
    personnel_number: &str,
    first_name: &str,
    patronymic: &str,
    birthday: NaiveDate,
) -> AppResult<Staff> {
    if find_staff(conn, personnel_number)?.is_some() {
        return Err(AppError::StaffExists(personnel_number.to_string()));
    }

    let result = conn.execute(
        "INSERT INTO staff (personnel_number, first_name, patronymic, birthday) VALUES (?1, ?2, ?3, ?4)",
        &[
            &personnel_number as &dyn rusqlite::ToSql,
            &first_name as &dyn rusqlite::ToSql,
            &patronymic as &dyn rusqlite::ToSql,
            &birthday as &dyn rusqlite::ToSql,
        ],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            return Err(AppError::StaffExists(personnel_number.to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Staff {
        id: conn.last_insert_rowid(),
        personnel_number: personnel_number.to_string(),
        first_name: first_name.to_string(),
        patronymic: patronymic.to_string(),
        birthday,
    })
}

/// Находит сотрудника по табельному номеру.
///
/// # Returns
///
/// Возвращает `Ok(Some(Staff))` если сотрудник найден, `Ok(None)` если нет.
pub fn find_staff(conn: &Connection, personnel_number: &str) -> AppResult<Option<Staff>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff WHERE personnel_number = ?1"
    ))?;
    let mut rows = stmt.query(&[&personnel_number as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_staff_row(row)?))
    } else {
        Ok(None)
    }
}

/// Находит сотрудника по внутреннему идентификатору.
pub fn staff_by_id(conn: &Connection, id: i64) -> AppResult<Option<Staff>> {
    let mut stmt = conn.prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff WHERE id = ?1"))?;
    let mut rows = stmt.query(&[&id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_staff_row(row)?))
    } else {
        Ok(None)
    }
}

/// Возвращает весь справочник сотрудников.
pub fn all_staff(conn: &Connection) -> AppResult<Vec<Staff>> {
    let mut stmt = conn.prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff ORDER BY personnel_number"))?;
    let rows = stmt.query_map([], map_staff_row)?;

    let mut staff = Vec::new();
    for row in rows {
        staff.push(row?);
    }
    Ok(staff)
}

/// Возвращает сотрудников, у которых день рождения приходится на указанные
/// месяц и день (год рождения игнорируется).
pub fn birthdays_on(conn: &Connection, month: u32, day: u32) -> AppResult<Vec<Staff>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STAFF_COLUMNS} FROM staff
         WHERE CAST(strftime('%m', birthday) AS INTEGER) = ?1
           AND CAST(strftime('%d', birthday) AS INTEGER) = ?2
         ORDER BY personnel_number"
    ))?;
    let rows = stmt.query_map(
        &[&(month as i64) as &dyn rusqlite::ToSql, &(day as i64) as &dyn rusqlite::ToSql],
        map_staff_row,
    )?;

    let mut staff = Vec::new();
    for row in rows {
        staff.push(row?);
    }
    Ok(staff)
}

/// Удаляет сотрудника из справочника по табельному номеру.
///
/// Привязанный пользователь (если есть) отвязывается и деактивируется -
/// сотрудник покинул штат, аккаунт теряет участие в сборах. Оба изменения
/// применяются в одной транзакции.
///
/// # Errors
///
/// Возвращает `StaffNotFound`, если табельный номер не найден.
pub fn remove_staff(conn: &Connection, personnel_number: &str) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;

    let staff = match find_staff(&tx, personnel_number)? {
        Some(staff) => staff,
        None => return Err(AppError::StaffNotFound(personnel_number.to_string())),
    };

    tx.execute(
        "UPDATE users SET staff_id = NULL, is_active = 0 WHERE staff_id = ?1",
        &[&staff.id as &dyn rusqlite::ToSql],
    )?;
    tx.execute("DELETE FROM staff WHERE id = ?1", &[&staff.id as &dyn rusqlite::ToSql])?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::{create_test_pool, get_connection};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_add_and_find_staff() {
        let pool = create_test_pool().unwrap();
        let conn = get_connection(&pool).unwrap();

        let created = add_staff(&conn, "12345", "Иван", "Иванович", date(1990, 6, 15)).unwrap();
        let found = find_staff(&conn, "12345").unwrap().unwrap();

        assert_eq!(found.id, created.id);
        assert_eq!(found.first_name, "Иван");
        assert_eq!(found.patronymic, "Иванович");
        assert_eq!(found.birthday, date(1990, 6, 15));
        assert_eq!(found.display_name(), "Иван Иванович");
    }

    #[test]
    fn test_duplicate_personnel_number_rejected() {
        let pool = create_test_pool().unwrap();
        let conn = get_connection(&pool).unwrap();

        add_staff(&conn, "12345", "Иван", "Иванович", date(1990, 6, 15)).unwrap();
        let err = add_staff(&conn, "12345", "Пётр", "Петрович", date(1985, 1, 1)).unwrap_err();
        assert!(matches!(err, AppError::StaffExists(n) if n == "12345"));

        // первый сотрудник не перезаписан
        assert_eq!(find_staff(&conn, "12345").unwrap().unwrap().first_name, "Иван");
    }

    #[test]
    fn test_remove_staff_not_found() {
        let pool = create_test_pool().unwrap();
        let conn = get_connection(&pool).unwrap();

        let err = remove_staff(&conn, "99999").unwrap_err();
        assert!(matches!(err, AppError::StaffNotFound(_)));
    }

    #[test]
    fn test_birthdays_on_ignores_year() {
        let pool = create_test_pool().unwrap();
        let conn = get_connection(&pool).unwrap();

        add_staff(&conn, "11111", "Иван", "Иванович", date(1990, 6, 15)).unwrap();
        add_staff(&conn, "22222", "Пётр", "Петрович", date(1975, 6, 15)).unwrap();
        add_staff(&conn, "33333", "Анна", "Сергеевна", date(1990, 7, 15)).unwrap();

        let matched = birthdays_on(&conn, 6, 15).unwrap();
        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|s| s.birthday.format("%m-%d").to_string() == "06-15"));
    }
}
