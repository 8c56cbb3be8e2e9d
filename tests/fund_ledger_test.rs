//! Интеграционные тесты учёта сборов: создание, взносы, закрытие, статус.

mod common;

use common::{date, register_employee, test_pool};
use pretty_assertions::assert_eq;

use kassabot::core::error::AppError;
use kassabot::storage::funds::{
    add_donation, close_fund, create_fund, donation_total, fund_status, get_fund, unpaid_users, FundKind,
};
use kassabot::storage::get_connection;
use kassabot::storage::users::deactivate_user;

const TODAY: (i32, u32, u32) = (2026, 8, 6);

fn today() -> chrono::NaiveDate {
    date(TODAY.0, TODAY.1, TODAY.2)
}

#[test]
fn collected_amount_always_equals_sum_of_donations() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let first = register_employee(&conn, 200, "10002", date(1985, 2, 20));
    let second = register_employee(&conn, 300, "10003", date(1990, 3, 30));

    let fund = create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today() + chrono::Duration::days(14),
        Some(3000.0),
        today(),
    )
    .unwrap();
    assert_eq!(fund.collected_amount, 0.0);
    assert!(!fund.is_closed);

    add_donation(&conn, fund.id, first.id, 500.0).unwrap();
    add_donation(&conn, fund.id, second.id, 250.5).unwrap();
    // повторный взнос того же донора разрешён
    add_donation(&conn, fund.id, first.id, 100.0).unwrap();

    let fund = get_fund(&conn, fund.id).unwrap().unwrap();
    assert_eq!(fund.collected_amount, 850.5);
    assert_eq!(donation_total(&conn, fund.id).unwrap(), fund.collected_amount);

    // "сдал" определяется фактом взноса, не суммой: двое уникальных
    let status = fund_status(&conn, fund.id, today()).unwrap();
    assert_eq!(status.donors_count, 2);
}

#[test]
fn donation_to_closed_fund_fails_and_leaves_amount_unchanged() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let donor = register_employee(&conn, 200, "10002", date(1985, 2, 20));

    let fund = create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today() + chrono::Duration::days(7),
        None,
        today(),
    )
    .unwrap();
    add_donation(&conn, fund.id, donor.id, 300.0).unwrap();
    close_fund(&conn, fund.id).unwrap();

    let err = add_donation(&conn, fund.id, donor.id, 200.0).unwrap_err();
    assert!(matches!(err, AppError::FundClosed(id) if id == fund.id));

    let fund = get_fund(&conn, fund.id).unwrap().unwrap();
    assert_eq!(fund.collected_amount, 300.0);
    assert_eq!(donation_total(&conn, fund.id).unwrap(), 300.0);
}

#[test]
fn non_positive_donation_rejected() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let fund = create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today() + chrono::Duration::days(7),
        None,
        today(),
    )
    .unwrap();

    assert!(matches!(
        add_donation(&conn, fund.id, treasurer.id, 0.0),
        Err(AppError::NonPositiveAmount(_))
    ));
    assert!(matches!(
        add_donation(&conn, fund.id, treasurer.id, -10.0),
        Err(AppError::NonPositiveAmount(_))
    ));
    assert_eq!(donation_total(&conn, fund.id).unwrap(), 0.0);
}

#[test]
fn donation_to_missing_fund_fails() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let donor = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    assert!(matches!(
        add_donation(&conn, 777, donor.id, 100.0),
        Err(AppError::FundNotFound(777))
    ));
}

#[test]
fn self_collection_forbidden_for_birthday_funds() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let birthday_person = register_employee(&conn, 100, "10001", date(1990, 6, 15));
    let other = register_employee(&conn, 200, "10002", date(1985, 2, 20));

    // казначей = именинник -> отказ
    let err = create_fund(
        &conn,
        FundKind::Birthday,
        "ДР: Сотрудник Тестович",
        birthday_person.staff_id,
        birthday_person.id,
        today() + chrono::Duration::days(10),
        None,
        today(),
    )
    .unwrap_err();
    assert!(matches!(err, AppError::SelfCollection));

    // другой казначей -> успех
    let fund = create_fund(
        &conn,
        FundKind::Birthday,
        "ДР: Сотрудник Тестович",
        birthday_person.staff_id,
        other.id,
        today() + chrono::Duration::days(10),
        None,
        today(),
    )
    .unwrap();
    assert_eq!(fund.treasurer_id, other.id);
}

#[test]
fn deadline_must_be_strictly_in_the_future() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));

    for bad in [today(), today() - chrono::Duration::days(1)] {
        let err = create_fund(&conn, FundKind::Event, "Событие", None, treasurer.id, bad, None, today()).unwrap_err();
        assert!(matches!(err, AppError::InvalidDeadline(_)));
    }

    assert!(create_fund(
        &conn,
        FundKind::Event,
        "Событие",
        None,
        treasurer.id,
        today() + chrono::Duration::days(1),
        None,
        today()
    )
    .is_ok());
}

#[test]
fn close_fund_is_idempotent_and_one_directional() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let fund = create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today() + chrono::Duration::days(7),
        None,
        today(),
    )
    .unwrap();

    close_fund(&conn, fund.id).unwrap();
    // повторное закрытие - no-op, не ошибка
    close_fund(&conn, fund.id).unwrap();
    assert!(get_fund(&conn, fund.id).unwrap().unwrap().is_closed);

    assert!(matches!(close_fund(&conn, 999), Err(AppError::FundNotFound(999))));
}

#[test]
fn status_reports_negative_remaining_when_overfunded() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let treasurer = register_employee(&conn, 100, "10001", date(1980, 1, 10));
    let donor = register_employee(&conn, 200, "10002", date(1985, 2, 20));

    let fund = create_fund(
        &conn,
        FundKind::Event,
        "Корпоратив",
        None,
        treasurer.id,
        today() + chrono::Duration::days(3),
        Some(1000.0),
        today(),
    )
    .unwrap();
    add_donation(&conn, fund.id, donor.id, 1500.0).unwrap();

    let status = fund_status(&conn, fund.id, today()).unwrap();
    assert_eq!(status.remaining, Some(-500.0));
    assert_eq!(status.days_left, 3);

    // после дедлайна days_left уходит в минус, сбор остаётся открытым
    let late = fund_status(&conn, fund.id, today() + chrono::Duration::days(10)).unwrap();
    assert_eq!(late.days_left, -7);
    assert!(!late.is_closed);
}

#[test]
fn unpaid_users_excludes_donors_birthday_person_and_inactive() {
    let pool = test_pool();
    let conn = get_connection(&pool).unwrap();

    let birthday_person = register_employee(&conn, 100, "10001", date(1990, 6, 15));
    let treasurer = register_employee(&conn, 200, "10002", date(1980, 1, 10));
    let donor = register_employee(&conn, 300, "10003", date(1985, 2, 20));
    let debtor = register_employee(&conn, 400, "10004", date(1995, 4, 4));
    let inactive = register_employee(&conn, 500, "10005", date(1992, 5, 5));
    deactivate_user(&conn, inactive.id).unwrap();

    let fund = create_fund(
        &conn,
        FundKind::Birthday,
        "ДР: Сотрудник Тестович",
        birthday_person.staff_id,
        treasurer.id,
        today() + chrono::Duration::days(10),
        None,
        today(),
    )
    .unwrap();
    add_donation(&conn, fund.id, donor.id, 500.0).unwrap();

    let unpaid = unpaid_users(&conn, fund.id).unwrap();
    let unpaid_ids: Vec<i64> = unpaid.iter().map(|u| u.id).collect();

    // именинник не должник по собственному сбору, даже без единого взноса
    assert!(!unpaid_ids.contains(&birthday_person.id));
    assert!(!unpaid_ids.contains(&donor.id));
    assert!(!unpaid_ids.contains(&inactive.id));
    // казначей и просто молчащий участник - должники
    assert!(unpaid_ids.contains(&treasurer.id));
    assert!(unpaid_ids.contains(&debtor.id));
    assert_eq!(unpaid.len(), 2);
}
