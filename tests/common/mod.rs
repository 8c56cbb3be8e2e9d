//! Common test utilities
//!
//! Shared fixtures for integration tests: an in-memory database pool and
//! seed helpers for staff and registered users.

use chrono::NaiveDate;
use rusqlite::Connection;

use kassabot::storage::db::{create_test_pool, DbPool};
use kassabot::storage::staff::{add_staff, Staff};
use kassabot::storage::users::{grant_role, register_user, Role, User};

pub fn test_pool() -> DbPool {
    create_test_pool().expect("failed to create in-memory pool")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid test date")
}

/// Добавляет сотрудника в справочник.
#[allow(dead_code)]
pub fn add_employee(conn: &Connection, number: &str, first_name: &str, birthday: NaiveDate) -> Staff {
    add_staff(conn, number, first_name, "Тестович", birthday).expect("failed to add staff")
}

/// Добавляет сотрудника и сразу регистрирует его в боте.
#[allow(dead_code)]
pub fn register_employee(conn: &Connection, telegram_id: i64, number: &str, birthday: NaiveDate) -> User {
    add_staff(conn, number, "Сотрудник", "Тестович", birthday).expect("failed to add staff");
    register_user(conn, telegram_id, None, number).expect("failed to register user")
}

/// Регистрирует сотрудника и выдаёт ему роль.
#[allow(dead_code)]
pub fn register_with_role(
    conn: &Connection,
    telegram_id: i64,
    number: &str,
    birthday: NaiveDate,
    role: Role,
) -> User {
    let user = register_employee(conn, telegram_id, number, birthday);
    grant_role(conn, user.id, role).expect("failed to grant role");
    user
}
