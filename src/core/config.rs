use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: kassa.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "kassa.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Telegram ID суперадминистратора.
/// Читается из SUPERADMIN_ID; 0 означает, что суперадмин не задан
/// и при старте не создаётся.
pub static SUPERADMIN_ID: Lazy<i64> = Lazy::new(|| {
    env::var("SUPERADMIN_ID")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
});

/// Reminder scheduling configuration
pub mod reminder {
    use once_cell::sync::Lazy;
    use std::env;
    use std::time::Duration;

    /// Hour of day (0-23, local clock of the host) when the daily
    /// reminder jobs run.
    /// Read from REMINDER_HOUR environment variable
    /// Default: 10
    pub static HOUR: Lazy<u32> = Lazy::new(|| {
        env::var("REMINDER_HOUR")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|h| *h < 24)
            .unwrap_or(10)
    });

    /// За сколько дней до дня рождения напоминать администраторам.
    /// Read from BIRTHDAY_REMINDER_DAYS environment variable
    /// Default: 10
    pub static BIRTHDAY_REMINDER_DAYS: Lazy<i64> = Lazy::new(|| {
        env::var("BIRTHDAY_REMINDER_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10)
    });

    /// За сколько дней до дедлайна сбора напоминать казначею.
    /// Read from FUND_REMINDER_DAYS environment variable
    /// Default: 3
    pub static FUND_REMINDER_DAYS: Lazy<i64> = Lazy::new(|| {
        env::var("FUND_REMINDER_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    });

    /// Interval between outbox dispatch runs (in seconds)
    /// Read from OUTBOX_INTERVAL_SECS environment variable
    /// Default: 300 (5 minutes)
    pub static OUTBOX_INTERVAL_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("OUTBOX_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300)
    });

    /// Outbox dispatch interval duration
    pub fn outbox_interval() -> Duration {
        Duration::from_secs(*OUTBOX_INTERVAL_SECS)
    }
}

/// Notification retention configuration
pub mod retention {
    use once_cell::sync::Lazy;
    use std::env;

    /// Сколько дней хранить уведомления до очистки.
    /// Read from NOTIFICATION_RETENTION_DAYS environment variable
    /// Default: 30
    pub static NOTIFICATION_RETENTION_DAYS: Lazy<i64> = Lazy::new(|| {
        env::var("NOTIFICATION_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30)
    });
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;
    use once_cell::sync::Lazy;
    use std::env;

    /// Duration between handled messages per user (in seconds)
    /// Read from RATE_LIMIT_COOLDOWN_SECS environment variable
    /// Default: 3
    pub static COOLDOWN_SECS: Lazy<u64> = Lazy::new(|| {
        env::var("RATE_LIMIT_COOLDOWN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3)
    });

    /// Rate limit duration
    pub fn duration() -> Duration {
        Duration::from_secs(*COOLDOWN_SECS)
    }
}

/// Значения по умолчанию для сборов
pub mod funds {
    /// Длительность сбора, если дедлайн не задан явно (в днях)
    pub const DEFAULT_FUND_DURATION_DAYS: i64 = 14;

    /// Рекомендуемая сумма сбора на день рождения
    pub const DEFAULT_BIRTHDAY_FUND_AMOUNT: f64 = 1000.0;

    /// Рекомендуемая сумма сбора на событие
    pub const DEFAULT_EVENT_FUND_AMOUNT: f64 = 500.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reminder_defaults() {
        // Defaults apply when the variables are not set in the test env
        std::env::remove_var("REMINDER_HOUR");
        std::env::remove_var("OUTBOX_INTERVAL_SECS");
        assert!(*reminder::HOUR < 24);
        assert!(reminder::outbox_interval().as_secs() > 0);
    }

    #[test]
    fn test_fund_defaults_positive() {
        assert!(funds::DEFAULT_BIRTHDAY_FUND_AMOUNT > 0.0);
        assert!(funds::DEFAULT_EVENT_FUND_AMOUNT > 0.0);
        assert!(funds::DEFAULT_FUND_DURATION_DAYS > 0);
    }
}
