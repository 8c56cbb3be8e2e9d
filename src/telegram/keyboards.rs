//! Генерация inline-клавиатур для управления сборами.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Возвращает inline-клавиатуру казначея по управлению сбором.
///
/// # Arguments
///
/// * `fund_id` - Идентификатор сбора
pub fn treasurer_fund_menu(fund_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "➕ Внести взнос",
            format!("add_donation:{fund_id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "🔄 Напомнить должникам",
            format!("remind_unpaid:{fund_id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "📊 Статус сбора",
            format!("fund_status:{fund_id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "✅ Закрыть сбор",
            format!("close_fund:{fund_id}"),
        )],
    ])
}

/// Клавиатура участника сбора: взнос и статус.
pub fn member_fund_menu(fund_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "➕ Внести взнос",
            format!("add_donation:{fund_id}"),
        )],
        vec![InlineKeyboardButton::callback(
            "📊 Статус сбора",
            format!("fund_status:{fund_id}"),
        )],
    ])
}
