use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::core::error::{AppError, AppResult};
use crate::storage::users::{self, User};

/// Типы сборов: день рождения или событие.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundKind {
    Birthday,
    Event,
}

impl FundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundKind::Birthday => "birthday",
            FundKind::Event => "event",
        }
    }

    pub fn parse(name: &str) -> Option<FundKind> {
        match name {
            "birthday" => Some(FundKind::Birthday),
            "event" => Some(FundKind::Event),
            _ => None,
        }
    }
}

/// Структура, представляющая сбор средств.
#[derive(Debug, Clone)]
pub struct Fund {
    /// Идентификатор сбора
    pub id: i64,
    /// Тип сбора
    pub kind: FundKind,
    /// Название (для ДР - имя именинника, для события - его название)
    pub title: String,
    /// Именинник (запись справочника), только для сборов на ДР
    pub staff_id: Option<i64>,
    /// Казначей сбора
    pub treasurer_id: i64,
    /// Дедлайн сбора
    pub deadline: NaiveDate,
    /// Целевая сумма (не обязательна)
    pub target_amount: Option<f64>,
    /// Накопленная сумма: бегущий итог, равный сумме всех взносов
    pub collected_amount: f64,
    /// Флаг закрытия: закрытый сбор взносы не принимает, переоткрытия нет
    pub is_closed: bool,
    /// Дата создания
    pub created_at: String,
}

/// Взнос пользователя в сбор. Неизменяемый после создания.
#[derive(Debug, Clone, Serialize)]
pub struct Donation {
    pub id: i64,
    pub fund_id: i64,
    pub donor_id: i64,
    pub amount: f64,
    pub donated_at: String,
}

/// Сводный статус сбора для отчёта казначею.
#[derive(Debug, Clone, Serialize)]
pub struct FundStatus {
    pub fund_id: i64,
    pub title: String,
    pub kind: String,
    pub target_amount: Option<f64>,
    pub collected_amount: f64,
    /// Остаток до цели; отрицательное значение означает перевыполнение
    pub remaining: Option<f64>,
    /// Число уникальных вкладчиков
    pub donors_count: i64,
    /// Дней до дедлайна; отрицательное значение - дедлайн прошёл
    pub days_left: i64,
    pub is_closed: bool,
}

/// Запись "мои взносы": взнос вместе с названием сбора.
#[derive(Debug, Clone, Serialize)]
pub struct DonationRecord {
    pub fund_title: Option<String>,
    pub fund_kind: Option<String>,
    pub amount: f64,
    pub donated_at: String,
}

const FUND_COLUMNS: &str =
    "id, fund_type, title, staff_id, treasurer_id, deadline, target_amount, collected_amount, is_closed, created_at";

fn map_fund_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Fund> {
    let kind_text: String = row.get(1)?;
    Ok(Fund {
        id: row.get(0)?,
        // Неизвестный тип в БД означает повреждение данных; трактуем как событие
        kind: FundKind::parse(&kind_text).unwrap_or(FundKind::Event),
        title: row.get(2)?,
        staff_id: row.get(3)?,
        treasurer_id: row.get(4)?,
        deadline: row.get(5)?,
        target_amount: row.get(6)?,
        collected_amount: row.get(7)?,
        is_closed: row.get::<_, i64>(8)? != 0,
        created_at: row.get(9)?,
    })
}

/// Создаёт новый сбор.
///
/// # Arguments
///
/// * `kind` - Тип сбора
/// * `title` - Название сбора
/// * `staff_id` - Именинник (обязателен для сборов на ДР)
/// * `treasurer_id` - Казначей
/// * `deadline` - Дедлайн, строго в будущем относительно `today`
/// * `target_amount` - Целевая сумма (опционально)
/// * `today` - Текущая дата (передаётся явно ради детерминированных проверок)
///
/// # Errors
///
/// * `InvalidDeadline` - дедлайн не в будущем
/// * `SelfCollection` - казначей совпадает с именинником
pub fn create_fund(
    conn: &Connection,
    kind: FundKind,
    title: &str,
    staff_id: Option<i64>,
    treasurer_id: i64,
    deadline: NaiveDate,
    target_amount: Option<f64>,
    today: NaiveDate,
) -> AppResult<Fund> {
    if deadline <= today {
        return Err(AppError::InvalidDeadline(deadline));
    }

    if kind == FundKind::Birthday {
        let staff_id = staff_id.ok_or_else(|| {
            AppError::Validation("Для сбора на день рождения нужно указать именинника".to_string())
        })?;
        if let Some(linked) = users::get_user_by_staff(conn, staff_id)? {
            if linked.id == treasurer_id {
                return Err(AppError::SelfCollection);
            }
        }
    }

    conn.execute(
        "INSERT INTO funds (fund_type, title, staff_id, treasurer_id, deadline, target_amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            &kind.as_str() as &dyn rusqlite::ToSql,
            &title as &dyn rusqlite::ToSql,
            &staff_id as &dyn rusqlite::ToSql,
            &treasurer_id as &dyn rusqlite::ToSql,
            &deadline as &dyn rusqlite::ToSql,
            &target_amount as &dyn rusqlite::ToSql,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_fund(conn, id)?.ok_or(AppError::FundNotFound(id))
}

/// Получает сбор по идентификатору.
pub fn get_fund(conn: &Connection, fund_id: i64) -> AppResult<Option<Fund>> {
    let mut stmt = conn.prepare(&format!("SELECT {FUND_COLUMNS} FROM funds WHERE id = ?1"))?;
    let mut rows = stmt.query(&[&fund_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(map_fund_row(row)?))
    } else {
        Ok(None)
    }
}

/// Возвращает все открытые сборы.
pub fn active_funds(conn: &Connection) -> AppResult<Vec<Fund>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FUND_COLUMNS} FROM funds WHERE is_closed = 0 ORDER BY deadline, id"
    ))?;
    let rows = stmt.query_map([], map_fund_row)?;

    let mut funds = Vec::new();
    for row in rows {
        funds.push(row?);
    }
    Ok(funds)
}

/// Возвращает открытые сборы казначея.
pub fn funds_by_treasurer(conn: &Connection, treasurer_id: i64) -> AppResult<Vec<Fund>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FUND_COLUMNS} FROM funds WHERE treasurer_id = ?1 AND is_closed = 0 ORDER BY deadline, id"
    ))?;
    let rows = stmt.query_map(&[&treasurer_id as &dyn rusqlite::ToSql], map_fund_row)?;

    let mut funds = Vec::new();
    for row in rows {
        funds.push(row?);
    }
    Ok(funds)
}

/// Закрывает сбор. Переход одностороний: закрытие уже закрытого сбора -
/// успешный no-op, переоткрытия нет. Истечение дедлайна само по себе сбор
/// не закрывает.
///
/// # Errors
///
/// Возвращает `FundNotFound`, если сбор не существует.
pub fn close_fund(conn: &Connection, fund_id: i64) -> AppResult<()> {
    if get_fund(conn, fund_id)?.is_none() {
        return Err(AppError::FundNotFound(fund_id));
    }
    conn.execute(
        "UPDATE funds SET is_closed = 1 WHERE id = ?1",
        &[&fund_id as &dyn rusqlite::ToSql],
    )?;
    Ok(())
}

/// Добавляет взнос в сбор.
///
/// Вставка взноса и инкремент бегущего итога выполняются одной транзакцией;
/// итог обновляется относительным UPDATE-ом, поэтому параллельные взносы не
/// теряют друг друга.
///
/// # Errors
///
/// * `NonPositiveAmount` - сумма не положительная
/// * `FundNotFound` - сбор не существует
/// * `FundClosed` - сбор закрыт
pub fn add_donation(conn: &Connection, fund_id: i64, donor_id: i64, amount: f64) -> AppResult<Donation> {
    if amount.is_nan() || amount <= 0.0 {
        return Err(AppError::NonPositiveAmount(amount));
    }

    let tx = conn.unchecked_transaction()?;

    let fund = match get_fund(&tx, fund_id)? {
        Some(fund) => fund,
        None => return Err(AppError::FundNotFound(fund_id)),
    };
    if fund.is_closed {
        return Err(AppError::FundClosed(fund_id));
    }

    tx.execute(
        "INSERT INTO donations (fund_id, donor_id, amount) VALUES (?1, ?2, ?3)",
        &[
            &fund_id as &dyn rusqlite::ToSql,
            &donor_id as &dyn rusqlite::ToSql,
            &amount as &dyn rusqlite::ToSql,
        ],
    )?;
    let donation_id = tx.last_insert_rowid();

    tx.execute(
        "UPDATE funds SET collected_amount = collected_amount + ?1 WHERE id = ?2",
        &[&amount as &dyn rusqlite::ToSql, &fund_id as &dyn rusqlite::ToSql],
    )?;

    let donated_at: String = tx.query_row(
        "SELECT donated_at FROM donations WHERE id = ?1",
        &[&donation_id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;

    tx.commit()?;

    Ok(Donation {
        id: donation_id,
        fund_id,
        donor_id,
        amount,
        donated_at,
    })
}

/// Возвращает все взносы сбора в порядке поступления.
pub fn fund_donations(conn: &Connection, fund_id: i64) -> AppResult<Vec<Donation>> {
    let mut stmt = conn.prepare(
        "SELECT id, fund_id, donor_id, amount, donated_at FROM donations WHERE fund_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(&[&fund_id as &dyn rusqlite::ToSql], |row| {
        Ok(Donation {
            id: row.get(0)?,
            fund_id: row.get(1)?,
            donor_id: row.get(2)?,
            amount: row.get(3)?,
            donated_at: row.get(4)?,
        })
    })?;

    let mut donations = Vec::new();
    for row in rows {
        donations.push(row?);
    }
    Ok(donations)
}

/// Сумма всех взносов сбора (вычисляется агрегатом, не бегущим итогом).
pub fn donation_total(conn: &Connection, fund_id: i64) -> AppResult<f64> {
    let total: Option<f64> = conn.query_row(
        "SELECT SUM(amount) FROM donations WHERE fund_id = ?1",
        &[&fund_id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(total.unwrap_or(0.0))
}

/// Возвращает сводный статус сбора.
pub fn fund_status(conn: &Connection, fund_id: i64, today: NaiveDate) -> AppResult<FundStatus> {
    let fund = get_fund(conn, fund_id)?.ok_or(AppError::FundNotFound(fund_id))?;

    let donors_count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT donor_id) FROM donations WHERE fund_id = ?1",
        &[&fund_id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;

    Ok(FundStatus {
        fund_id: fund.id,
        title: fund.title.clone(),
        kind: fund.kind.as_str().to_string(),
        target_amount: fund.target_amount,
        collected_amount: fund.collected_amount,
        remaining: fund.target_amount.map(|target| target - fund.collected_amount),
        donors_count,
        days_left: (fund.deadline - today).num_days(),
        is_closed: fund.is_closed,
    })
}

/// Возвращает активных пользователей, не сделавших взнос в сбор.
///
/// Для сборов на день рождения именинник исключается всегда: человек не
/// должник по собственному сбору, даже если ни разу не сдавал.
pub fn unpaid_users(conn: &Connection, fund_id: i64) -> AppResult<Vec<User>> {
    let fund = get_fund(conn, fund_id)?.ok_or(AppError::FundNotFound(fund_id))?;

    let mut stmt = conn.prepare(
        "SELECT id, telegram_id, username, staff_id, department, is_active, created_at FROM users
         WHERE is_active = 1
           AND id NOT IN (SELECT DISTINCT donor_id FROM donations WHERE fund_id = ?1)
           AND (?2 IS NULL OR staff_id IS NULL OR staff_id != ?2)
         ORDER BY id",
    )?;
    let rows = stmt.query_map(
        &[&fund_id as &dyn rusqlite::ToSql, &fund.staff_id as &dyn rusqlite::ToSql],
        |row| {
            Ok(User {
                id: row.get(0)?,
                telegram_id: row.get(1)?,
                username: row.get(2)?,
                staff_id: row.get(3)?,
                department: row.get(4)?,
                is_active: row.get::<_, i64>(5)? != 0,
                created_at: row.get(6)?,
            })
        },
    )?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row?);
    }
    Ok(users)
}

/// Возвращает открытые сборы с дедлайном в ближайшие `window_days` дней
/// (строго после `today`, не позже `today + window_days`).
pub fn funds_near_deadline(conn: &Connection, today: NaiveDate, window_days: i64) -> AppResult<Vec<Fund>> {
    let upper = today + chrono::Duration::days(window_days);
    let mut stmt = conn.prepare(&format!(
        "SELECT {FUND_COLUMNS} FROM funds
         WHERE is_closed = 0 AND deadline > ?1 AND deadline <= ?2
         ORDER BY deadline, id"
    ))?;
    let rows = stmt.query_map(
        &[&today as &dyn rusqlite::ToSql, &upper as &dyn rusqlite::ToSql],
        map_fund_row,
    )?;

    let mut funds = Vec::new();
    for row in rows {
        funds.push(row?);
    }
    Ok(funds)
}

/// Возвращает все взносы пользователя с названиями сборов.
pub fn user_donations(conn: &Connection, donor_id: i64) -> AppResult<Vec<DonationRecord>> {
    let mut stmt = conn.prepare(
        "SELECT funds.title, funds.fund_type, donations.amount, donations.donated_at
         FROM donations
         LEFT JOIN funds ON funds.id = donations.fund_id
         WHERE donations.donor_id = ?1
         ORDER BY donations.id",
    )?;
    let rows = stmt.query_map(&[&donor_id as &dyn rusqlite::ToSql], |row| {
        Ok(DonationRecord {
            fund_title: row.get(0)?,
            fund_kind: row.get(1)?,
            amount: row.get(2)?,
            donated_at: row.get(3)?,
        })
    })?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}
