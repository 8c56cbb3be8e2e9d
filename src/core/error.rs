use chrono::NaiveDate;
use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting. The variants fall into five classes: validation,
/// authorization, not-found, conflict and storage; only the storage class
/// is not recoverable at the call site.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Malformed or out-of-range date input
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Fund deadline is not strictly in the future
    #[error("invalid deadline: {0}")]
    InvalidDeadline(NaiveDate),

    /// Donation amount must be positive
    #[error("non-positive donation amount: {0}")]
    NonPositiveAmount(f64),

    /// Generic input validation failure (wrong format, wrong argument count)
    #[error("validation error: {0}")]
    Validation(String),

    /// Сотрудник с таким табельным номером уже существует
    #[error("staff with personnel number {0} already exists")]
    StaffExists(String),

    /// Сотрудник с таким табельным номером не найден
    #[error("staff with personnel number {0} not found")]
    StaffNotFound(String),

    /// Табельный номер не числится в справочнике сотрудников
    #[error("personnel number {0} is unknown")]
    UnknownPersonnelNumber(String),

    /// Пользователь или сотрудник уже привязан к другой регистрации
    #[error("telegram user {0} is already registered")]
    AlreadyRegistered(i64),

    /// Казначей не может быть именинником собственного сбора
    #[error("treasurer cannot be the birthday person of their own fund")]
    SelfCollection,

    /// Сбор не найден
    #[error("fund {0} not found")]
    FundNotFound(i64),

    /// Сбор уже закрыт и не принимает взносы
    #[error("fund {0} is closed")]
    FundClosed(i64),

    /// Пользователь не найден
    #[error("user {0} not found")]
    UserNotFound(i64),

    /// Отправитель не зарегистрирован в боте
    #[error("sender is not registered")]
    NotRegistered,

    /// Не хватает роли или пользователь не казначей этого сбора
    #[error("access denied: {0}")]
    AccessDenied(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Текст, который можно показать пользователю в чате.
    ///
    /// Для классов валидации/доступа/конфликтов возвращает конкретную
    /// подсказку; ошибки хранилища и Telegram сводятся к общему сообщению,
    /// подробности остаются в логе.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidDate(text) => {
                format!("❌ Неверный формат даты: {text}. Используйте ДД.ММ.ГГГГ")
            }
            AppError::InvalidDeadline(date) => format!(
                "❌ Дедлайн {} уже прошёл или наступает сегодня. Укажите дату в будущем.",
                date.format("%d.%m.%Y")
            ),
            AppError::NonPositiveAmount(_) => {
                "❌ Сумма взноса должна быть положительным числом.".to_string()
            }
            AppError::Validation(text) => format!("❌ {text}"),
            AppError::StaffExists(number) => {
                format!("❌ Сотрудник с табельным номером {number} уже существует.")
            }
            AppError::StaffNotFound(number) => {
                format!("❌ Сотрудник с табельным номером {number} не найден.")
            }
            AppError::UnknownPersonnelNumber(number) => {
                format!("❌ Табельный номер {number} не найден в справочнике сотрудников.")
            }
            AppError::AlreadyRegistered(_) => "⚠️ Вы уже зарегистрированы.".to_string(),
            AppError::SelfCollection => {
                "❌ Казначей не может быть именинником собственного сбора.".to_string()
            }
            AppError::FundNotFound(id) => format!("❌ Сбор №{id} не найден."),
            AppError::FundClosed(id) => format!("⚠️ Сбор №{id} уже закрыт."),
            AppError::UserNotFound(_) => "❌ Пользователь не найден.".to_string(),
            AppError::NotRegistered => {
                "❌ Вы не зарегистрированы. Введите /start для регистрации.".to_string()
            }
            AppError::AccessDenied(_) => "⛔ Нет доступа к этой команде.".to_string(),
            AppError::Database(_) | AppError::DatabasePool(_) | AppError::Telegram(_) => {
                "⚠️ Внутренняя ошибка, попробуйте позже.".to_string()
            }
        }
    }

    /// Возвращает true для ошибок хранилища/транспорта, которые нельзя
    /// исправить повторным вводом.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::DatabasePool(_) | AppError::Telegram(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mentions_personnel_number() {
        let err = AppError::StaffExists("12345".to_string());
        assert!(err.user_message().contains("12345"));
    }

    #[test]
    fn test_storage_errors_are_not_recoverable() {
        let err = AppError::Database(rusqlite::Error::InvalidQuery);
        assert!(err.is_storage());
        let err = AppError::SelfCollection;
        assert!(!err.is_storage());
    }
}
