//! Помощники доставки: отправка сообщений с подавлением ошибок.
//!
//! Сбой доставки одному получателю никогда не валит рассылку: ошибка
//! логируется, обход продолжается.

use teloxide::prelude::*;

/// Отправляет текст в чат. Ошибка логируется и не поднимается.
///
/// # Returns
///
/// Возвращает `true`, если сообщение было отправлено.
pub async fn send_text(bot: &Bot, telegram_id: i64, text: &str) -> bool {
    match bot.send_message(ChatId(telegram_id), text).await {
        Ok(_) => true,
        Err(e) => {
            log::error!("Failed to send message to chat {}: {}", telegram_id, e);
            false
        }
    }
}
