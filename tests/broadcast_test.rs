//! Интеграционные тесты рассылок: правила распределения и отложенная
//! отправка через очередь уведомлений.

mod common;

use common::{date, register_employee, test_pool};
use pretty_assertions::assert_eq;

use kassabot::core::error::AppError;
use kassabot::storage::get_connection;
use kassabot::storage::notifications::{
    create_broadcast, expand_broadcast, pending_due, user_notifications, BroadcastAudience,
};
use kassabot::storage::users::{deactivate_user, update_user, UserUpdate};

fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

#[test]
fn broadcast_all_reaches_every_active_user() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let sender = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let second = register_employee(&conn, 200, "10002", date(1985, 2, 20));
    let inactive = register_employee(&conn, 300, "10003", date(1990, 3, 30));
    deactivate_user(&conn, inactive.id).unwrap();

    let broadcast = create_broadcast(
        &conn,
        sender.id,
        "Объявление",
        "Всем привет",
        BroadcastAudience::All,
        None,
        None,
    )
    .unwrap();
    let count = expand_broadcast(&conn, &broadcast, date(2026, 8, 6)).unwrap();

    assert_eq!(count, 2);
    assert_eq!(user_notifications(&conn, sender.id, false).unwrap().len(), 1);
    assert_eq!(user_notifications(&conn, second.id, false).unwrap().len(), 1);
    assert!(user_notifications(&conn, inactive.id, false).unwrap().is_empty());
}

#[test]
fn no_birthday_broadcast_skips_todays_birthday_person() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    // день рождения ровно сегодня (год другой)
    let birthday_person = register_employee(&conn, 100, "10001", date(1990, 8, 6));
    let other = register_employee(&conn, 200, "10002", date(1985, 2, 20));

    let broadcast = create_broadcast(
        &conn,
        other.id,
        "Сюрприз",
        "Скидываемся на подарок",
        BroadcastAudience::NoBirthday,
        None,
        None,
    )
    .unwrap();
    let count = expand_broadcast(&conn, &broadcast, date(2026, 8, 6)).unwrap();

    assert_eq!(count, 1);
    assert!(user_notifications(&conn, birthday_person.id, false).unwrap().is_empty());
    assert_eq!(user_notifications(&conn, other.id, false).unwrap().len(), 1);
}

#[test]
fn department_broadcast_filters_by_department() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let accounting = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let engineering = register_employee(&conn, 200, "10002", date(1985, 2, 20));
    let no_department = register_employee(&conn, 300, "10003", date(1990, 3, 30));

    update_user(
        &conn,
        accounting.id,
        &UserUpdate {
            department: Some("Бухгалтерия".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    update_user(
        &conn,
        engineering.id,
        &UserUpdate {
            department: Some("Разработка".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let broadcast = create_broadcast(
        &conn,
        accounting.id,
        "Отчётность",
        "Сдаём отчёты",
        BroadcastAudience::Department,
        Some("Бухгалтерия"),
        None,
    )
    .unwrap();
    let count = expand_broadcast(&conn, &broadcast, date(2026, 8, 6)).unwrap();

    assert_eq!(count, 1);
    assert_eq!(user_notifications(&conn, accounting.id, false).unwrap().len(), 1);
    assert!(user_notifications(&conn, engineering.id, false).unwrap().is_empty());
    assert!(user_notifications(&conn, no_department.id, false).unwrap().is_empty());
}

#[test]
fn department_broadcast_requires_department() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let sender = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let err = create_broadcast(
        &conn,
        sender.id,
        "Отчётность",
        "Сдаём отчёты",
        BroadcastAudience::Department,
        None,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn scheduled_broadcast_becomes_due_at_its_time() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let sender = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let scheduled_for = dt(2026, 8, 7, 9, 0);

    let broadcast = create_broadcast(
        &conn,
        sender.id,
        "Планёрка",
        "Завтра в 10:00",
        BroadcastAudience::All,
        None,
        Some(scheduled_for),
    )
    .unwrap();
    let count = expand_broadcast(&conn, &broadcast, date(2026, 8, 6)).unwrap();
    assert_eq!(count, 1);

    // до назначенного времени уведомление не отдаётся диспетчеру
    assert!(pending_due(&conn, dt(2026, 8, 6, 12, 0)).unwrap().is_empty());
    // в назначенное время - отдаётся
    assert_eq!(pending_due(&conn, scheduled_for).unwrap().len(), 1);
}
