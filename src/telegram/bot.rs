//! Bot initialization and command surface
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Per-role command list scoping

use teloxide::prelude::*;
use teloxide::types::{BotCommand, BotCommandScope, ChatId, Recipient};
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::storage::users::Role;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "snake_case", description = "Я умею:")]
pub enum Command {
    #[command(description = "регистрация и начало работы")]
    Start,
    #[command(description = "мои данные")]
    Mydata,
    #[command(description = "ближайшие именинники")]
    Birthdays,
    #[command(description = "активные сборы")]
    ActiveFunds,
    #[command(description = "мои взносы")]
    MyDonations,
    #[command(description = "мои уведомления")]
    Notifications,
    #[command(description = "отменить текущее действие")]
    Cancel,
    #[command(description = "статус сбора: /fund_status <id>")]
    FundStatus(i64),
    #[command(description = "внести взнос: /add_donation <id>")]
    AddDonation(i64),
    #[command(description = "закрыть сбор: /close_fund <id>")]
    CloseFund(i64),
    #[command(description = "напомнить должникам: /remind_fund <id>")]
    RemindFund(i64),
    #[command(description = "выгрузка сбора: /export_fund <id>")]
    ExportFund(i64),
    #[command(description = "добавить сотрудника")]
    AddStaff,
    #[command(description = "удалить сотрудника")]
    RemoveStaff,
    #[command(description = "создать сбор (ДР)")]
    CreateBirthdayFund,
    #[command(description = "создать сбор (событие)")]
    CreateEventFund,
    #[command(description = "назначить казначея")]
    AssignTreasurer,
    #[command(description = "рассылка всем")]
    Broadcast,
    #[command(description = "рассылка без именинников")]
    BirthdayBroadcast,
    #[command(description = "рассылка по подразделению")]
    DepartmentBroadcast,
    #[command(description = "отложенное объявление")]
    Announcement,
    #[command(description = "выдать роль: /grant_role <telegram_id> <роль>", parse_with = "split")]
    GrantRole(i64, String),
    #[command(description = "снять роль: /revoke_role <telegram_id> <роль>", parse_with = "split")]
    RevokeRole(i64, String),
    #[command(description = "деактивировать пользователя: /deactivate <telegram_id>")]
    Deactivate(i64),
}

/// Creates a Bot instance from the configured token.
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Token is missing
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set"));
    }
    Ok(Bot::new(token))
}

fn user_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "регистрация и начало работы"),
        BotCommand::new("mydata", "мои данные"),
        BotCommand::new("birthdays", "ближайшие именинники"),
        BotCommand::new("active_funds", "активные сборы"),
        BotCommand::new("my_donations", "мои взносы"),
        BotCommand::new("notifications", "мои уведомления"),
        BotCommand::new("add_donation", "внести взнос: /add_donation <id>"),
        BotCommand::new("cancel", "отменить текущее действие"),
    ]
}

fn treasurer_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("fund_status", "статус сбора: /fund_status <id>"),
        BotCommand::new("close_fund", "закрыть сбор: /close_fund <id>"),
        BotCommand::new("remind_fund", "напомнить должникам: /remind_fund <id>"),
        BotCommand::new("export_fund", "выгрузка сбора: /export_fund <id>"),
    ]
}

fn admin_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("add_staff", "добавить сотрудника"),
        BotCommand::new("remove_staff", "удалить сотрудника"),
        BotCommand::new("create_birthday_fund", "создать сбор (ДР)"),
        BotCommand::new("create_event_fund", "создать сбор (событие)"),
        BotCommand::new("assign_treasurer", "назначить казначея"),
        BotCommand::new("broadcast", "рассылка всем"),
        BotCommand::new("birthday_broadcast", "рассылка без именинников"),
        BotCommand::new("department_broadcast", "рассылка по подразделению"),
        BotCommand::new("announcement", "отложенное объявление"),
    ]
}

fn superadmin_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("grant_role", "выдать роль: /grant_role <telegram_id> <роль>"),
        BotCommand::new("revoke_role", "снять роль: /revoke_role <telegram_id> <роль>"),
        BotCommand::new("deactivate", "деактивировать: /deactivate <telegram_id>"),
    ]
}

/// Собирает список команд для набора ролей пользователя.
pub fn commands_for_roles(roles: &[Role]) -> Vec<BotCommand> {
    let mut commands = user_commands();
    if roles.contains(&Role::Treasurer) {
        commands.extend(treasurer_commands());
    }
    if roles.contains(&Role::Admin) || roles.contains(&Role::Superadmin) {
        // казначейские команды не дублируем, если уже добавлены
        let missing: Vec<BotCommand> = treasurer_commands()
            .into_iter()
            .filter(|c| !commands.iter().any(|existing| existing.command == c.command))
            .collect();
        commands.extend(missing);
        commands.extend(admin_commands());
    }
    if roles.contains(&Role::Superadmin) {
        commands.extend(superadmin_commands());
    }
    commands
}

/// Устанавливает персональный список команд чата по ролям пользователя.
///
/// # Arguments
/// * `bot` - Bot instance
/// * `chat_id` - Чат пользователя
/// * `roles` - Роли пользователя
pub async fn set_commands_for_roles(bot: &Bot, chat_id: i64, roles: &[Role]) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(commands_for_roles(roles))
        .scope(BotCommandScope::Chat {
            chat_id: Recipient::Id(ChatId(chat_id)),
        })
        .await?;
    Ok(())
}

/// Sets up the default (unregistered user) command list in Telegram UI.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "регистрация и начало работы"),
        BotCommand::new("cancel", "отменить текущее действие"),
    ])
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_for_plain_user() {
        let commands = commands_for_roles(&[Role::User]);
        assert!(commands.iter().any(|c| c.command == "start"));
        assert!(!commands.iter().any(|c| c.command == "add_staff"));
        assert!(!commands.iter().any(|c| c.command == "grant_role"));
    }

    #[test]
    fn test_commands_for_admin_include_treasurer_ops_once() {
        let commands = commands_for_roles(&[Role::User, Role::Treasurer, Role::Admin]);
        let close_count = commands.iter().filter(|c| c.command == "close_fund").count();
        assert_eq!(close_count, 1);
        assert!(commands.iter().any(|c| c.command == "add_staff"));
    }

    #[test]
    fn test_commands_for_superadmin() {
        let commands = commands_for_roles(&[Role::User, Role::Superadmin]);
        assert!(commands.iter().any(|c| c.command == "grant_role"));
        assert!(commands.iter().any(|c| c.command == "add_staff"));
    }

    #[test]
    fn test_command_parsing() {
        let cmd = Command::parse("/fund_status 5", "testbot").unwrap();
        assert!(matches!(cmd, Command::FundStatus(5)));

        let cmd = Command::parse("/grant_role 123 admin", "testbot").unwrap();
        assert!(matches!(cmd, Command::GrantRole(123, ref role) if role == "admin"));

        assert!(Command::parse("/fund_status", "testbot").is_err());
    }
}
