//! Handler types, dependencies and conversation state

use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;

use crate::core::rate_limiter::RateLimiter;
use crate::storage::db::DbPool;
use crate::storage::notifications::BroadcastAudience;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Шаг незавершённого многошагового диалога.
///
/// Состояние держится в памяти по chat id: ответ обычным текстом
/// интерпретируется как ввод для текущего шага. Команда /cancel или
/// рестарт процесса сбрасывают диалог.
#[derive(Debug, Clone)]
pub enum PendingFlow {
    /// Регистрация: ожидается табельный номер
    RegisterPersonnelNumber,
    /// Добавление сотрудника: ожидается строка "Табельный;Имя;Отчество;ДД.ММ.ГГГГ"
    AddStaffData,
    /// Удаление сотрудника: ожидается табельный номер
    RemoveStaffNumber,
    /// Сбор на ДР: ожидается табельный номер именинника
    BirthdayFundStaff,
    /// Сбор на ДР: ожидается дедлайн
    BirthdayFundDeadline { staff_id: i64 },
    /// Сбор на ДР: ожидается табельный номер казначея
    BirthdayFundTreasurer { staff_id: i64, deadline: NaiveDate },
    /// Сбор на ДР: ожидается целевая сумма ("-" = без цели)
    BirthdayFundAmount {
        staff_id: i64,
        deadline: NaiveDate,
        treasurer_id: i64,
    },
    /// Сбор на событие: ожидается название
    EventFundName,
    /// Сбор на событие: ожидается дедлайн
    EventFundDeadline { title: String },
    /// Сбор на событие: ожидается табельный номер казначея
    EventFundTreasurer { title: String, deadline: NaiveDate },
    /// Сбор на событие: ожидается целевая сумма ("-" = без цели)
    EventFundAmount {
        title: String,
        deadline: NaiveDate,
        treasurer_id: i64,
    },
    /// Назначение казначея: ожидается табельный номер
    AssignTreasurerNumber,
    /// Взнос: ожидается сумма
    DonationAmount { fund_id: i64 },
    /// Напоминание должникам: ожидается текст
    FundReminderText { fund_id: i64 },
    /// Рассылка по подразделению: ожидается название подразделения
    BroadcastDepartment,
    /// Рассылка: ожидается заголовок
    BroadcastTitle {
        audience: BroadcastAudience,
        department: Option<String>,
    },
    /// Рассылка: ожидается текст
    BroadcastMessage {
        audience: BroadcastAudience,
        department: Option<String>,
        title: String,
    },
    /// Объявление: ожидается заголовок
    AnnouncementTitle,
    /// Объявление: ожидается текст
    AnnouncementMessage { title: String },
    /// Объявление: ожидается время отправки "ДД.ММ.ГГГГ ЧЧ:ММ"
    AnnouncementSchedule { title: String, message: String },
}

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Незавершённые диалоги по chat id
    pub flows: Arc<DashMap<i64, PendingFlow>>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(db_pool: Arc<DbPool>, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            db_pool,
            rate_limiter,
            flows: Arc::new(DashMap::new()),
        }
    }
}
