//! Input validation for the command surface
//!
//! Provides validation for everything users type into the bot:
//! - Dates in `ДД.ММ.ГГГГ` form (calendar-checked, no silent rollover)
//! - Personnel numbers (5-digit opaque identifiers)
//! - Donation amounts (positive numbers)

use chrono::{NaiveDate, NaiveDateTime};

use crate::core::error::AppError;

/// Parses a date in `ДД.ММ.ГГГГ` format into a `NaiveDate`.
///
/// The date is validated against the calendar: `31.02.2024` or `40.01.2024`
/// are rejected, not normalized.
///
/// # Arguments
/// * `text` - The user-supplied date string
///
/// # Returns
/// * `Ok(NaiveDate)` if the text is a well-formed calendar date
/// * `Err(AppError::InvalidDate)` otherwise
///
/// # Examples
/// ```
/// use kassabot::core::validation::parse_date;
///
/// assert!(parse_date("15.06.1990").is_ok());
/// assert!(parse_date("29.02.2024").is_ok()); // leap year
/// assert!(parse_date("29.02.2023").is_err());
/// assert!(parse_date("1990-06-15").is_err());
/// ```
pub fn parse_date(text: &str) -> Result<NaiveDate, AppError> {
    let mut parts = text.trim().splitn(3, '.');
    let (day, month, year) = match (parts.next(), parts.next(), parts.next()) {
        (Some(d), Some(m), Some(y)) => (d, m, y),
        _ => return Err(AppError::InvalidDate(text.trim().to_string())),
    };

    let day: u32 = day.parse().map_err(|_| AppError::InvalidDate(text.trim().to_string()))?;
    let month: u32 = month.parse().map_err(|_| AppError::InvalidDate(text.trim().to_string()))?;
    let year: i32 = year.parse().map_err(|_| AppError::InvalidDate(text.trim().to_string()))?;

    if year < 1900 {
        return Err(AppError::InvalidDate(text.trim().to_string()));
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| AppError::InvalidDate(text.trim().to_string()))
}

/// Formats a date back into the external `ДД.ММ.ГГГГ` form.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Validates a personnel number: exactly five ASCII digits.
///
/// Personnel numbers are opaque identifiers, so no range check beyond the
/// digit-count rule the HR roster uses.
pub fn is_valid_personnel_number(text: &str) -> bool {
    let text = text.trim();
    text.len() == 5 && text.chars().all(|c| c.is_ascii_digit())
}

/// Parses a donation amount.
///
/// Accepts both `500` and `500.50`; a comma decimal separator is tolerated
/// since that is how amounts are usually typed in Russian locale.
///
/// # Returns
/// * `Ok(f64)` for a positive finite amount
/// * `Err(AppError::NonPositiveAmount)` for zero or negative input
/// * `Err(AppError::Validation)` for non-numeric input
pub fn parse_amount(text: &str) -> Result<f64, AppError> {
    let normalized = text.trim().replace(',', ".");
    let amount: f64 = normalized
        .parse()
        .map_err(|_| AppError::Validation(format!("Сумма '{}' не является числом", text.trim())))?;

    if !amount.is_finite() {
        return Err(AppError::Validation(format!("Сумма '{}' не является числом", text.trim())));
    }
    if amount <= 0.0 {
        return Err(AppError::NonPositiveAmount(amount));
    }
    Ok(amount)
}

/// Parses a schedule timestamp in `ДД.ММ.ГГГГ ЧЧ:ММ` format.
///
/// Used for scheduled announcements; the date part goes through
/// [`parse_date`] and inherits its calendar checks.
pub fn parse_schedule(text: &str) -> Result<NaiveDateTime, AppError> {
    let text = text.trim();
    let (date_part, time_part) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| AppError::InvalidDate(text.to_string()))?;

    let date = parse_date(date_part)?;

    let (hour, minute) = time_part
        .trim()
        .split_once(':')
        .ok_or_else(|| AppError::InvalidDate(text.to_string()))?;
    let hour: u32 = hour.parse().map_err(|_| AppError::InvalidDate(text.to_string()))?;
    let minute: u32 = minute.parse().map_err(|_| AppError::InvalidDate(text.to_string()))?;

    date.and_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::InvalidDate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== parse_date Tests ====================

    #[test]
    fn test_parse_date_valid() {
        let cases = vec![
            ("15.06.1990", (1990, 6, 15)),
            ("01.01.2000", (2000, 1, 1)),
            ("29.02.2024", (2024, 2, 29)),
            ("31.12.2030", (2030, 12, 31)),
            (" 15.06.1990 ", (1990, 6, 15)), // surrounding whitespace
        ];

        for (input, (y, m, d)) in cases {
            let date = parse_date(input).unwrap();
            assert_eq!(date, NaiveDate::from_ymd_opt(y, m, d).unwrap(), "Failed for: {}", input);
        }
    }

    #[test]
    fn test_parse_date_out_of_calendar_range() {
        let cases = vec!["32.01.2024", "00.01.2024", "29.02.2023", "31.04.2024", "15.13.2024"];

        for input in cases {
            assert!(parse_date(input).is_err(), "Should fail for: {}", input);
        }
    }

    #[test]
    fn test_parse_date_malformed() {
        let cases = vec!["", "не дата", "1990-06-15", "15/06/1990", "15.06", "15.06.90x"];

        for input in cases {
            assert!(parse_date(input).is_err(), "Should fail for: {}", input);
        }
    }

    #[test]
    fn test_parse_date_rejects_pre_1900() {
        assert!(parse_date("15.06.1899").is_err());
        assert!(parse_date("15.06.1900").is_ok());
    }

    #[test]
    fn test_format_date_round_trip() {
        let date = parse_date("05.03.1985").unwrap();
        assert_eq!(format_date(date), "05.03.1985");
    }

    // ==================== personnel number Tests ====================

    #[test]
    fn test_personnel_number_valid() {
        assert!(is_valid_personnel_number("12345"));
        assert!(is_valid_personnel_number("00001"));
        assert!(is_valid_personnel_number(" 54321 "));
    }

    #[test]
    fn test_personnel_number_invalid() {
        let cases = vec!["1234", "123456", "12a45", "", "12 45", "-1234"];

        for input in cases {
            assert!(!is_valid_personnel_number(input), "Should reject: {}", input);
        }
    }

    // ==================== parse_schedule Tests ====================

    #[test]
    fn test_parse_schedule_valid() {
        let dt = parse_schedule("15.06.2026 10:30").unwrap();
        assert_eq!(
            dt,
            NaiveDate::from_ymd_opt(2026, 6, 15).unwrap().and_hms_opt(10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_schedule_invalid() {
        let cases = vec!["15.06.2026", "15.06.2026 25:00", "15.06.2026 10:70", "10:30", "завтра в 10"];

        for input in cases {
            assert!(parse_schedule(input).is_err(), "Should fail for: {}", input);
        }
    }

    // ==================== parse_amount Tests ====================

    #[test]
    fn test_parse_amount_valid() {
        assert_eq!(parse_amount("500").unwrap(), 500.0);
        assert_eq!(parse_amount("500.50").unwrap(), 500.5);
        assert_eq!(parse_amount("500,50").unwrap(), 500.5); // comma separator
        assert_eq!(parse_amount(" 1 ").unwrap(), 1.0);
    }

    #[test]
    fn test_parse_amount_non_positive() {
        assert!(matches!(parse_amount("0"), Err(AppError::NonPositiveAmount(_))));
        assert!(matches!(parse_amount("-100"), Err(AppError::NonPositiveAmount(_))));
    }

    #[test]
    fn test_parse_amount_not_a_number() {
        assert!(matches!(parse_amount("сто"), Err(AppError::Validation(_))));
        assert!(matches!(parse_amount(""), Err(AppError::Validation(_))));
        assert!(matches!(parse_amount("nan"), Err(AppError::Validation(_))));
        assert!(matches!(parse_amount("inf"), Err(AppError::Validation(_))));
    }
}
