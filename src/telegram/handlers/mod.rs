//! Обработчики команд и многошаговых диалогов

pub mod broadcasts;
pub mod callbacks;
pub mod funds;
pub mod registration;
pub mod staff;
pub mod user;

use crate::core::error::AppError;
use crate::telegram::types::PendingFlow;

/// Результат шага диалога: завершить или перейти к следующему шагу.
pub enum FlowOutcome {
    Done,
    Next(PendingFlow),
}

/// Ошибки ввода, после которых пользователь остаётся на том же шаге
/// диалога и может просто повторить ввод. Остальные ошибки сбрасывают
/// диалог.
pub fn keeps_flow(err: &AppError) -> bool {
    matches!(
        err,
        AppError::InvalidDate(_)
            | AppError::InvalidDeadline(_)
            | AppError::Validation(_)
            | AppError::NonPositiveAmount(_)
            | AppError::UnknownPersonnelNumber(_)
    )
}
