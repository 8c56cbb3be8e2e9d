use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Rate limiter для ограничения частоты сообщений пользователей.
///
/// Между обработанными сообщениями одного чата выдерживается пауза
/// (cooldown); сообщения чаще лимита отбрасываются с подсказкой подождать.
#[derive(Clone)]
pub struct RateLimiter {
    /// Хранилище временных меток, до которых чат ограничен
    limits: Arc<Mutex<HashMap<ChatId, Instant>>>,
    /// Пауза между сообщениями
    cooldown: Duration,
}

impl RateLimiter {
    /// Создает rate limiter с паузой из конфигурации.
    pub fn new() -> Self {
        Self::with_cooldown(crate::core::config::rate_limit::duration())
    }

    /// Создает rate limiter с кастомной паузой.
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Время между сообщениями одного чата
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            limits: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
        }
    }

    /// Проверяет, ограничен ли чат по частоте сообщений.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - ID чата для проверки
    ///
    /// # Returns
    ///
    /// Возвращает `true` если чат все еще ограничен.
    pub async fn is_rate_limited(&self, chat_id: ChatId) -> bool {
        let limits = self.limits.lock().await;
        if let Some(&until) = limits.get(&chat_id) {
            if Instant::now() < until {
                return true;
            }
        }
        false
    }

    /// Обновляет временную метку после обработанного сообщения.
    ///
    /// # Arguments
    ///
    /// * `chat_id` - ID чата
    pub async fn update_rate_limit(&self, chat_id: ChatId) {
        let mut limits = self.limits.lock().await;
        limits.insert(chat_id, Instant::now() + self.cooldown);
    }

    /// Удаляет ограничение для указанного чата.
    pub async fn remove_rate_limit(&self, chat_id: ChatId) {
        let mut limits = self.limits.lock().await;
        limits.remove(&chat_id);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_not_limited_initially() {
        let limiter = RateLimiter::with_cooldown(Duration::from_secs(30));
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
    }

    #[tokio::test]
    async fn test_limited_after_update() {
        let limiter = RateLimiter::with_cooldown(Duration::from_secs(30));
        limiter.update_rate_limit(ChatId(1)).await;
        assert!(limiter.is_rate_limited(ChatId(1)).await);
        // Other chats are unaffected
        assert!(!limiter.is_rate_limited(ChatId(2)).await);
    }

    #[tokio::test]
    async fn test_remove_lifts_limit() {
        let limiter = RateLimiter::with_cooldown(Duration::from_secs(30));
        limiter.update_rate_limit(ChatId(1)).await;
        limiter.remove_rate_limit(ChatId(1)).await;
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
    }

    #[tokio::test]
    async fn test_limit_expires() {
        let limiter = RateLimiter::with_cooldown(Duration::from_millis(10));
        limiter.update_rate_limit(ChatId(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!limiter.is_rate_limited(ChatId(1)).await);
    }
}
