//! Выгрузка сбора для казначея: статус и список взносов одним JSON-файлом.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::core::error::AppResult;
use crate::storage::funds::{self, Donation, FundStatus};

/// Содержимое выгрузки.
#[derive(Debug, Serialize)]
pub struct FundExport {
    pub status: FundStatus,
    pub donations: Vec<Donation>,
}

/// Собирает выгрузку сбора: имя файла и JSON-содержимое.
///
/// # Errors
///
/// Возвращает `FundNotFound`, если сбор не существует.
pub fn build_fund_export(conn: &Connection, fund_id: i64, today: NaiveDate) -> AppResult<(String, Vec<u8>)> {
    let status = funds::fund_status(conn, fund_id, today)?;
    let donations = funds::fund_donations(conn, fund_id)?;

    let export = FundExport { status, donations };
    let body = serde_json::to_vec_pretty(&export)
        .map_err(|e| crate::core::error::AppError::Validation(format!("не удалось сериализовать выгрузку: {e}")))?;

    Ok((format!("fund_{fund_id}.json"), body))
}
