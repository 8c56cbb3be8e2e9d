//! Маршрутизация callback-кнопок inline-клавиатур.

use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::storage::db::get_connection;
use crate::telegram::handlers::funds;
use crate::telegram::middleware::current_user;
use crate::telegram::types::HandlerDeps;

/// Обрабатывает callback вида "действие:id_сбора".
///
/// Ошибки доступа и валидации показываются пользователю тем же текстом,
/// что и для команд.
pub async fn handle_callback(bot: &Bot, q: CallbackQuery, deps: &HandlerDeps) {
    // Останавливаем "часики" на кнопке независимо от результата
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let chat_id = match i64::try_from(q.from.id.0) {
        Ok(id) => id,
        Err(_) => return,
    };
    let Some(data) = q.data.as_deref() else { return };

    if let Err(e) = route_callback(bot, deps, chat_id, data).await {
        if e.is_storage() {
            log::error!("Callback '{}' failed for chat {}: {}", data, chat_id, e);
        }
        let _ = bot.send_message(ChatId(chat_id), e.user_message()).await;
    }
}

async fn route_callback(bot: &Bot, deps: &HandlerDeps, chat_id: i64, data: &str) -> AppResult<()> {
    let (action, id_text) = data
        .split_once(':')
        .ok_or_else(|| AppError::Validation("Неизвестное действие.".to_string()))?;
    let fund_id: i64 = id_text
        .parse()
        .map_err(|_| AppError::Validation("Неизвестное действие.".to_string()))?;

    let mut conn = get_connection(&deps.db_pool)?;
    let user = current_user(&conn, chat_id)?;

    match action {
        "fund_status" => funds::send_fund_status(bot, &mut conn, chat_id, &user, fund_id).await,
        "add_donation" => funds::start_donation_flow(bot, &mut conn, deps, chat_id, &user, fund_id).await,
        "remind_unpaid" => funds::start_remind_flow(bot, &mut conn, deps, chat_id, &user, fund_id).await,
        "close_fund" => funds::do_close_fund(bot, &mut conn, chat_id, &user, fund_id).await,
        _ => Err(AppError::Validation("Неизвестное действие.".to_string())),
    }
}
