//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::error::AppResult;
use crate::storage::notifications::BroadcastAudience;
use crate::telegram::bot::Command;
use crate::telegram::handlers::{self, FlowOutcome};
use crate::telegram::types::{HandlerDeps, HandlerError, PendingFlow};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. Branch order matters: commands win over pending dialog
/// steps, so /cancel always works mid-flow.
///
/// # Arguments
/// * `deps` - Handler dependencies (database pool, rate limiter, flows)
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_flow_filter = deps.clone();
    let deps_flow = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Command handler
        .branch(
            Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
                move |bot: Bot, msg: Message, cmd: Command| {
                    let deps = deps_commands.clone();
                    async move {
                        handle_command(&bot, &msg, cmd, &deps).await;
                        Ok(())
                    }
                },
            )),
        )
        // Pending dialog step handler
        .branch(
            Update::filter_message()
                .filter(move |msg: Message| {
                    msg.text().is_some() && deps_flow_filter.flows.contains_key(&msg.chat.id.0)
                })
                .endpoint(move |bot: Bot, msg: Message| {
                    let deps = deps_flow.clone();
                    async move {
                        handle_flow_message(&bot, &msg, &deps).await;
                        Ok(())
                    }
                }),
        )
        // Callback query handler (inline keyboard buttons)
        .branch(Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps_callback.clone();
            async move {
                handlers::callbacks::handle_callback(&bot, q, &deps).await;
                Ok(())
            }
        }))
        // Unknown slash commands
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().map(|t| t.starts_with('/')).unwrap_or(false))
                .endpoint(|bot: Bot, msg: Message| async move {
                    let _ = bot
                        .send_message(msg.chat.id, "Неизвестная команда. Наберите /start")
                        .await;
                    Ok(())
                }),
        )
}

/// Выполняет команду и показывает пользователю текст ошибки, если она
/// восстановимая; ошибки хранилища дополнительно уходят в лог.
async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) {
    if deps.rate_limiter.is_rate_limited(msg.chat.id).await {
        let _ = bot
            .send_message(msg.chat.id, "⏳ Слишком много запросов. Подождите немного и повторите.")
            .await;
        return;
    }
    deps.rate_limiter.update_rate_limit(msg.chat.id).await;

    log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

    let result = route_command(bot, msg, cmd, deps).await;
    if let Err(e) = result {
        if e.is_storage() {
            log::error!("Command failed for chat {}: {}", msg.chat.id, e);
        }
        let _ = bot.send_message(msg.chat.id, e.user_message()).await;
    }
}

async fn route_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> AppResult<()> {
    match cmd {
        Command::Start => handlers::registration::handle_start(bot, msg, deps).await,
        Command::Mydata => handlers::user::handle_mydata(bot, msg, deps).await,
        Command::Birthdays => handlers::staff::handle_birthdays(bot, msg, deps).await,
        Command::ActiveFunds => handlers::funds::handle_active_funds(bot, msg, deps).await,
        Command::MyDonations => handlers::funds::handle_my_donations(bot, msg, deps).await,
        Command::Notifications => handlers::user::handle_notifications(bot, msg, deps).await,
        Command::Cancel => {
            let cancelled = deps.flows.remove(&msg.chat.id.0).is_some();
            let text = if cancelled {
                "Действие отменено."
            } else {
                "Нет активного действия."
            };
            bot.send_message(msg.chat.id, text).await?;
            Ok(())
        }
        Command::FundStatus(fund_id) => handlers::funds::handle_fund_status(bot, msg, deps, fund_id).await,
        Command::AddDonation(fund_id) => handlers::funds::handle_add_donation(bot, msg, deps, fund_id).await,
        Command::CloseFund(fund_id) => handlers::funds::handle_close_fund(bot, msg, deps, fund_id).await,
        Command::RemindFund(fund_id) => handlers::funds::handle_remind_fund(bot, msg, deps, fund_id).await,
        Command::ExportFund(fund_id) => handlers::funds::handle_export_fund(bot, msg, deps, fund_id).await,
        Command::AddStaff => handlers::staff::handle_add_staff(bot, msg, deps).await,
        Command::RemoveStaff => handlers::staff::handle_remove_staff(bot, msg, deps).await,
        Command::CreateBirthdayFund => handlers::funds::handle_create_birthday_fund(bot, msg, deps).await,
        Command::CreateEventFund => handlers::funds::handle_create_event_fund(bot, msg, deps).await,
        Command::AssignTreasurer => handlers::funds::handle_assign_treasurer(bot, msg, deps).await,
        Command::Broadcast => {
            handlers::broadcasts::handle_broadcast_command(bot, msg, deps, BroadcastAudience::All).await
        }
        Command::BirthdayBroadcast => {
            handlers::broadcasts::handle_broadcast_command(bot, msg, deps, BroadcastAudience::NoBirthday).await
        }
        Command::DepartmentBroadcast => {
            handlers::broadcasts::handle_broadcast_command(bot, msg, deps, BroadcastAudience::Department).await
        }
        Command::Announcement => handlers::broadcasts::handle_announcement(bot, msg, deps).await,
        Command::GrantRole(target, role) => {
            handlers::user::handle_role_change(bot, msg, deps, target, &role, true).await
        }
        Command::RevokeRole(target, role) => {
            handlers::user::handle_role_change(bot, msg, deps, target, &role, false).await
        }
        Command::Deactivate(target) => handlers::user::handle_deactivate(bot, msg, deps, target).await,
    }
}

/// Выполняет текущий шаг диалога.
///
/// Шаг снимается с карты до выполнения; по результату он либо завершён,
/// либо заменён следующим, либо (после ошибки ввода) возвращён на место
/// для повторной попытки.
async fn handle_flow_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) {
    let chat_id = msg.chat.id.0;
    let Some(text) = msg.text().map(|t| t.to_string()) else { return };
    let Some((_, flow)) = deps.flows.remove(&chat_id) else { return };

    let result = dispatch_flow(bot, msg, deps, flow.clone(), &text).await;
    match result {
        Ok(FlowOutcome::Done) => {}
        Ok(FlowOutcome::Next(next)) => {
            deps.flows.insert(chat_id, next);
        }
        Err(e) => {
            if e.is_storage() {
                log::error!("Flow step failed for chat {}: {}", chat_id, e);
            }
            let _ = bot.send_message(msg.chat.id, e.user_message()).await;
            if handlers::keeps_flow(&e) {
                deps.flows.insert(chat_id, flow);
            }
        }
    }
}

async fn dispatch_flow(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    flow: PendingFlow,
    text: &str,
) -> AppResult<FlowOutcome> {
    use handlers::{broadcasts, funds, registration, staff};

    match flow {
        PendingFlow::RegisterPersonnelNumber => registration::process_personnel_number(bot, msg, deps, text).await,
        PendingFlow::AddStaffData => staff::process_add_staff_data(bot, msg, deps, text).await,
        PendingFlow::RemoveStaffNumber => staff::process_remove_staff_number(bot, msg, deps, text).await,
        PendingFlow::BirthdayFundStaff => funds::process_birthday_fund_staff(bot, msg, deps, text).await,
        PendingFlow::BirthdayFundDeadline { staff_id } => {
            funds::process_birthday_fund_deadline(bot, msg, deps, text, staff_id).await
        }
        PendingFlow::BirthdayFundTreasurer { staff_id, deadline } => {
            funds::process_birthday_fund_treasurer(bot, msg, deps, text, staff_id, deadline).await
        }
        PendingFlow::BirthdayFundAmount {
            staff_id,
            deadline,
            treasurer_id,
        } => funds::process_birthday_fund_amount(bot, msg, deps, text, staff_id, deadline, treasurer_id).await,
        PendingFlow::EventFundName => funds::process_event_fund_name(bot, msg, deps, text).await,
        PendingFlow::EventFundDeadline { title } => {
            funds::process_event_fund_deadline(bot, msg, deps, text, title).await
        }
        PendingFlow::EventFundTreasurer { title, deadline } => {
            funds::process_event_fund_treasurer(bot, msg, deps, text, title, deadline).await
        }
        PendingFlow::EventFundAmount {
            title,
            deadline,
            treasurer_id,
        } => funds::process_event_fund_amount(bot, msg, deps, text, title, deadline, treasurer_id).await,
        PendingFlow::AssignTreasurerNumber => funds::process_assign_treasurer(bot, msg, deps, text).await,
        PendingFlow::DonationAmount { fund_id } => {
            funds::process_donation_amount(bot, msg, deps, text, fund_id).await
        }
        PendingFlow::FundReminderText { fund_id } => {
            funds::process_fund_reminder_text(bot, msg, deps, text, fund_id).await
        }
        PendingFlow::BroadcastDepartment => broadcasts::process_broadcast_department(bot, msg, deps, text).await,
        PendingFlow::BroadcastTitle { audience, department } => {
            broadcasts::process_broadcast_title(bot, msg, deps, text, audience, department).await
        }
        PendingFlow::BroadcastMessage {
            audience,
            department,
            title,
        } => broadcasts::process_broadcast_message(bot, msg, deps, text, audience, department, title).await,
        PendingFlow::AnnouncementTitle => broadcasts::process_announcement_title(bot, msg, deps, text).await,
        PendingFlow::AnnouncementMessage { title } => {
            broadcasts::process_announcement_message(bot, msg, deps, text, title).await
        }
        PendingFlow::AnnouncementSchedule { title, message } => {
            broadcasts::process_announcement_schedule(bot, msg, deps, text, title, message).await
        }
    }
}
