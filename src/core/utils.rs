//! Date arithmetic and text helpers shared by handlers and scheduler jobs

use chrono::{Datelike, NaiveDate};

/// Возвращает правильную форму слова "день" для числа.
///
/// # Examples
/// ```
/// use kassabot::core::utils::pluralize_days;
///
/// assert_eq!(pluralize_days(1), "день");
/// assert_eq!(pluralize_days(3), "дня");
/// assert_eq!(pluralize_days(7), "дней");
/// assert_eq!(pluralize_days(21), "день");
/// ```
pub fn pluralize_days(n: i64) -> &'static str {
    let n = n.abs();
    let last_two = n % 100;
    if (11..=14).contains(&last_two) {
        return "дней";
    }
    match n % 10 {
        1 => "день",
        2..=4 => "дня",
        _ => "дней",
    }
}

/// Следующее наступление дня рождения: ближайшая дата с тем же месяцем и
/// днём, не раньше `today` (год игнорируется, при необходимости переносится
/// на следующий год).
///
/// Родившиеся 29 февраля в невисокосные годы учитываются 1 марта, чтобы
/// напоминание не пропадало.
pub fn next_birthday(birthday: NaiveDate, today: NaiveDate) -> NaiveDate {
    let occurrence_in = |year: i32| {
        NaiveDate::from_ymd_opt(year, birthday.month(), birthday.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
    };

    match occurrence_in(today.year()) {
        Some(this_year) if this_year >= today => this_year,
        // The date already passed this year (or could not be formed): wrap.
        // from_ymd_opt(year, 3, 1) always exists, so unwrap_or is unreachable
        // in practice; fall back to today to stay total.
        _ => occurrence_in(today.year() + 1).unwrap_or(today),
    }
}

/// Количество дней до ближайшего дня рождения (0 = сегодня).
pub fn days_until_birthday(birthday: NaiveDate, today: NaiveDate) -> i64 {
    (next_birthday(birthday, today) - today).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_pluralize_days() {
        let cases = vec![
            (1, "день"),
            (2, "дня"),
            (4, "дня"),
            (5, "дней"),
            (11, "дней"),
            (12, "дней"),
            (21, "день"),
            (22, "дня"),
            (100, "дней"),
            (101, "день"),
        ];

        for (n, expected) in cases {
            assert_eq!(pluralize_days(n), expected, "Failed for: {}", n);
        }
    }

    #[test]
    fn test_days_until_birthday_ahead_same_year() {
        // Birthday 15.06, today 05.06 -> 10 days
        assert_eq!(days_until_birthday(d(1990, 6, 15), d(2026, 6, 5)), 10);
    }

    #[test]
    fn test_days_until_birthday_today() {
        assert_eq!(days_until_birthday(d(1990, 6, 15), d(2026, 6, 15)), 0);
    }

    #[test]
    fn test_days_until_birthday_wraps_to_next_year() {
        // Birthday already passed this year
        let days = days_until_birthday(d(1990, 1, 10), d(2026, 12, 30));
        assert_eq!(days, 11); // 30.12.2026 -> 10.01.2027
    }

    #[test]
    fn test_next_birthday_feb_29_in_common_year() {
        // Non-leap year: observed on March 1st
        assert_eq!(next_birthday(d(1992, 2, 29), d(2026, 2, 20)), d(2026, 3, 1));
        // Leap year: the real date
        assert_eq!(next_birthday(d(1992, 2, 29), d(2028, 2, 20)), d(2028, 2, 29));
    }

    #[test]
    fn test_next_birthday_ignores_birth_year() {
        assert_eq!(next_birthday(d(1960, 7, 1), d(2026, 6, 30)), d(2026, 7, 1));
    }
}
