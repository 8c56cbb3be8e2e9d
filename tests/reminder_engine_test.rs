//! Интеграционные тесты движка напоминаний: ежедневные проверки, очередь
//! уведомлений, очистка.

mod common;

use common::{date, register_employee, register_with_role, test_pool};
use pretty_assertions::assert_eq;

use kassabot::scheduler::jobs::{birthday_check, fund_deadline_check, purge_old_notifications, unpaid_reminder_check};
use kassabot::storage::funds::{add_donation, close_fund, create_fund, FundKind};
use kassabot::storage::get_connection;
use kassabot::storage::notifications::{
    enqueue, mark_sent, pending_due, user_notifications, NotificationCategory,
};
use kassabot::storage::users::Role;

fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> chrono::NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

// ---------- Проверка дедлайнов сборов ----------

#[test]
fn deadline_check_notifies_exactly_the_treasurer() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 8, 6);
    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let bystander = register_employee(&conn, 200, "10002", date(1985, 2, 20));

    // дедлайн через 3 дня, окно 3 -> ровно одно уведомление казначею
    create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today + chrono::Duration::days(3),
        None,
        today,
    )
    .unwrap();

    let created = fund_deadline_check(&conn, today, 3).unwrap();
    assert_eq!(created, 1);

    let to_treasurer = user_notifications(&conn, treasurer.id, false).unwrap();
    assert_eq!(to_treasurer.len(), 1);
    assert!(to_treasurer[0].message.contains('3'));
    assert_eq!(to_treasurer[0].category, NotificationCategory::Fund);

    // никому кроме казначея
    assert!(user_notifications(&conn, bystander.id, false).unwrap().is_empty());

    // повторный прогон в тот же день даёт дубликат - это допустимо
    let created_again = fund_deadline_check(&conn, today, 3).unwrap();
    assert_eq!(created_again, 1);
    assert_eq!(user_notifications(&conn, treasurer.id, false).unwrap().len(), 2);
}

#[test]
fn deadline_check_window_is_strict() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 8, 6);
    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));

    // дедлайн за границей окна
    create_fund(
        &conn,
        FundKind::Event,
        "Далёкий",
        None,
        treasurer.id,
        today + chrono::Duration::days(4),
        None,
        today,
    )
    .unwrap();
    // закрытый сбор в окне - не напоминаем
    let closed = create_fund(
        &conn,
        FundKind::Event,
        "Закрытый",
        None,
        treasurer.id,
        today + chrono::Duration::days(2),
        None,
        today,
    )
    .unwrap();
    close_fund(&conn, closed.id).unwrap();

    assert_eq!(fund_deadline_check(&conn, today, 3).unwrap(), 0);
}

// ---------- Проверка дней рождения ----------

#[test]
fn birthday_check_notifies_admins_and_superadmins_only() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    // именинник 15.06, сегодня 05.06 -> ровно 10 дней
    let today = date(2026, 6, 5);
    let birthday_person = register_employee(&conn, 100, "10001", date(1990, 6, 15));
    let admin = register_with_role(&conn, 200, "10002", date(1980, 1, 10), Role::Admin);
    let superadmin = register_with_role(&conn, 300, "10003", date(1975, 2, 2), Role::Superadmin);
    let regular = register_employee(&conn, 400, "10004", date(1995, 3, 3));

    let created = birthday_check(&conn, today, 10).unwrap();
    assert_eq!(created, 2);

    for recipient in [&admin, &superadmin] {
        let inbox = user_notifications(&conn, recipient.id, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(inbox[0].message.contains("10"));
        assert_eq!(inbox[0].category, NotificationCategory::Birthday);
    }
    assert!(user_notifications(&conn, regular.id, false).unwrap().is_empty());
    assert!(user_notifications(&conn, birthday_person.id, false).unwrap().is_empty());
}

#[test]
fn birthday_check_wraps_over_new_year() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 12, 30);
    register_employee(&conn, 100, "10001", date(1990, 1, 5)); // через 6 дней
    let admin = register_with_role(&conn, 200, "10002", date(1980, 7, 7), Role::Admin);

    let created = birthday_check(&conn, today, 10).unwrap();
    assert_eq!(created, 1);
    let inbox = user_notifications(&conn, admin.id, false).unwrap();
    assert!(inbox[0].message.contains('6'));
}

#[test]
fn birthday_check_respects_lookahead() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 6, 5);
    register_employee(&conn, 100, "10001", date(1990, 6, 20)); // через 15 дней
    register_with_role(&conn, 200, "10002", date(1980, 1, 10), Role::Admin);

    assert_eq!(birthday_check(&conn, today, 10).unwrap(), 0);
}

#[test]
fn birthday_check_admin_with_both_roles_notified_once() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 6, 5);
    register_employee(&conn, 100, "10001", date(1990, 6, 15));
    let admin = register_with_role(&conn, 200, "10002", date(1980, 1, 10), Role::Admin);
    kassabot::storage::users::grant_role(&conn, admin.id, Role::Superadmin).unwrap();

    assert_eq!(birthday_check(&conn, today, 10).unwrap(), 1);
    assert_eq!(user_notifications(&conn, admin.id, false).unwrap().len(), 1);
}

// ---------- Напоминания неплательщикам ----------

#[test]
fn unpaid_check_covers_open_funds_and_skips_closed() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let today = date(2026, 8, 6);
    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let donor = register_employee(&conn, 200, "10002", date(1985, 2, 20));
    let debtor = register_employee(&conn, 300, "10003", date(1995, 3, 3));

    let open = create_fund(
        &conn,
        FundKind::Event,
        "Открытый",
        None,
        treasurer.id,
        today + chrono::Duration::days(10),
        None,
        today,
    )
    .unwrap();
    let closed = create_fund(
        &conn,
        FundKind::Event,
        "Закрытый",
        None,
        treasurer.id,
        today + chrono::Duration::days(10),
        None,
        today,
    )
    .unwrap();
    close_fund(&conn, closed.id).unwrap();
    add_donation(&conn, open.id, donor.id, 100.0).unwrap();

    // должники открытого сбора: казначей и молчащий участник
    let created = unpaid_reminder_check(&conn).unwrap();
    assert_eq!(created, 2);
    assert_eq!(user_notifications(&conn, debtor.id, false).unwrap().len(), 1);
    assert!(user_notifications(&conn, donor.id, false).unwrap().is_empty());

    // проверка безусловна по дедлайну: повторный прогон снова напоминает
    assert_eq!(unpaid_reminder_check(&conn).unwrap(), 2);
    assert_eq!(user_notifications(&conn, debtor.id, false).unwrap().len(), 2);
}

// ---------- Очередь уведомлений ----------

#[test]
fn outbox_returns_due_and_unscheduled_only() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let user = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let now = dt(2026, 8, 6, 12, 0);

    let immediate = enqueue(&conn, user.id, "t", "без расписания", NotificationCategory::System, None).unwrap();
    let past = enqueue(
        &conn,
        user.id,
        "t",
        "срок наступил",
        NotificationCategory::System,
        Some(dt(2026, 8, 6, 11, 0)),
    )
    .unwrap();
    let future = enqueue(
        &conn,
        user.id,
        "t",
        "ещё рано",
        NotificationCategory::System,
        Some(dt(2026, 8, 6, 13, 0)),
    )
    .unwrap();

    let due: Vec<i64> = pending_due(&conn, now).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(due, vec![immediate, past]);

    // после отметки отправленным уведомление не возвращается
    mark_sent(&conn, immediate).unwrap();
    mark_sent(&conn, immediate).unwrap(); // идемпотентно
    let due: Vec<i64> = pending_due(&conn, now).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(due, vec![past]);

    // будущее уведомление становится due после наступления срока
    let later: Vec<i64> = pending_due(&conn, dt(2026, 8, 6, 13, 0)).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(later, vec![past, future]);
}

// ---------- Очистка ----------

#[test]
fn purge_removes_only_notifications_older_than_cutoff() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let user = register_employee(&conn, 100, "10001", date(1980, 1, 10));

    let old_sent = enqueue(&conn, user.id, "t", "старое отправленное", NotificationCategory::System, None).unwrap();
    let old_unsent = enqueue(&conn, user.id, "t", "старое неотправленное", NotificationCategory::System, None).unwrap();
    let fresh = enqueue(&conn, user.id, "t", "свежее", NotificationCategory::System, None).unwrap();

    mark_sent(&conn, old_sent).unwrap();
    // состариваем две записи напрямую
    conn.execute(
        "UPDATE notifications SET created_at = '2020-01-01 00:00:00' WHERE id IN (?1, ?2)",
        [old_sent, old_unsent],
    )
    .unwrap();

    let now = dt(2026, 8, 6, 12, 0);
    let removed = purge_old_notifications(&conn, now, 30).unwrap();
    assert_eq!(removed, 2);

    let left: Vec<i64> = user_notifications(&conn, user.id, false).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(left, vec![fresh]);
}
