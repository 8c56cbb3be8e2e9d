//! Регистрация по табельному номеру.

use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::validation::is_valid_personnel_number;
use crate::storage::db::get_connection;
use crate::storage::users;
use crate::telegram::bot::set_commands_for_roles;
use crate::telegram::handlers::FlowOutcome;
use crate::telegram::middleware::audit_action;
use crate::telegram::types::{HandlerDeps, PendingFlow};

/// /start: уже зарегистрированным показывает меню, остальным запускает
/// диалог регистрации.
pub async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let chat_id = msg.chat.id.0;

    match users::get_user_by_telegram(&conn, chat_id)? {
        Some(user) if user.is_active => {
            let roles = users::user_roles(&conn, user.id)?;
            audit_action(&conn, Some(user.id), "start");
            drop(conn);

            // динамическое меню команд по ролям
            if let Err(e) = set_commands_for_roles(bot, chat_id, &roles).await {
                log::warn!("Failed to set chat commands for {}: {}", chat_id, e);
            }
            bot.send_message(msg.chat.id, "Вы уже зарегистрированы.").await?;
        }
        Some(_) => {
            bot.send_message(
                msg.chat.id,
                "⛔ Ваша учётная запись деактивирована. Обратитесь к администратору.",
            )
            .await?;
        }
        None => {
            audit_action(&conn, None, "start");
            drop(conn);
            bot.send_message(msg.chat.id, "Введите табельный номер для регистрации:")
                .await?;
            deps.flows.insert(chat_id, PendingFlow::RegisterPersonnelNumber);
        }
    }

    Ok(())
}

/// Шаг диалога: обработка введённого табельного номера.
pub async fn process_personnel_number(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    text: &str,
) -> AppResult<FlowOutcome> {
    let number = text.trim();
    if !is_valid_personnel_number(number) {
        return Err(AppError::Validation(
            "Табельный номер должен состоять из 5 цифр.".to_string(),
        ));
    }

    let conn = get_connection(&deps.db_pool)?;
    let chat_id = msg.chat.id.0;
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

    let user = users::register_user(&conn, chat_id, username, number)?;
    let roles = users::user_roles(&conn, user.id)?;
    audit_action(&conn, Some(user.id), "register");
    drop(conn);

    // popup-меню после регистрации
    if let Err(e) = set_commands_for_roles(bot, chat_id, &roles).await {
        log::warn!("Failed to set chat commands for {}: {}", chat_id, e);
    }
    bot.send_message(msg.chat.id, "✅ Регистрация успешна.").await?;

    Ok(FlowOutcome::Done)
}
