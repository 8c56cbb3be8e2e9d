//! Reminder engine for the production environment.
//!
//! Runs the daily checks (birthdays, fund deadlines, unpaid participants,
//! retention purge) at a configured hour and drains the notification
//! outbox every few minutes. Jobs coordinate only through the database:
//! each run takes a fresh pooled connection, catches its own errors and
//! never brings the scheduler down.

pub mod jobs;

use chrono::{Local, NaiveDateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio::time::interval;

use crate::core::config;
use crate::storage::db::{get_connection, DbPool};

/// Reminder engine that runs periodic checks and outbox dispatch
pub struct ReminderScheduler {
    bot: Bot,
    db_pool: Arc<DbPool>,
    running: Arc<AtomicBool>,
}

/// Момент следующего ежедневного запуска: ближайший `hour`:00:00 строго
/// после `now`. Вынесено в чистую функцию ради тестов.
fn next_daily_run(now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let today_run = now
        .date()
        .and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| now.date().and_hms_opt(0, 0, 0).unwrap_or(now));
    if today_run > now {
        today_run
    } else {
        today_run + chrono::Duration::days(1)
    }
}

impl ReminderScheduler {
    /// Creates a new reminder scheduler.
    ///
    /// # Arguments
    ///
    /// * `bot` - Telegram bot for outbox delivery
    /// * `db_pool` - Shared database pool
    pub fn new(bot: Bot, db_pool: Arc<DbPool>) -> Self {
        Self {
            bot,
            db_pool,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Checks if the reminder engine is enabled via environment variable.
    ///
    /// Returns true if REMINDERS_ENABLED is not set or is set to "true", "1", "yes"
    pub fn is_enabled() -> bool {
        std::env::var("REMINDERS_ENABLED")
            .map(|v| {
                let v = v.to_lowercase();
                v == "true" || v == "1" || v == "yes"
            })
            .unwrap_or(true) // Enabled by default
    }

    /// Runs the daily job set once: birthdays, fund deadlines, unpaid
    /// participants, retention purge. Every job gets its own connection
    /// and its errors are logged, not propagated.
    pub fn run_daily_jobs(&self) {
        log::info!("Starting daily reminder jobs...");
        let today = Local::now().date_naive();

        match get_connection(&self.db_pool) {
            Ok(conn) => match jobs::birthday_check(&conn, today, *config::reminder::BIRTHDAY_REMINDER_DAYS) {
                Ok(count) => log::info!("Birthday check done: {} notification(s)", count),
                Err(e) => log::error!("Error in birthday check: {}", e),
            },
            Err(e) => log::error!("Failed to get DB connection for birthday check: {}", e),
        }

        match get_connection(&self.db_pool) {
            Ok(conn) => match jobs::fund_deadline_check(&conn, today, *config::reminder::FUND_REMINDER_DAYS) {
                Ok(count) => log::info!("Fund deadline check done: {} notification(s)", count),
                Err(e) => log::error!("Error in fund deadline check: {}", e),
            },
            Err(e) => log::error!("Failed to get DB connection for fund deadline check: {}", e),
        }

        match get_connection(&self.db_pool) {
            Ok(conn) => match jobs::unpaid_reminder_check(&conn) {
                Ok(count) => log::info!("Unpaid reminder check done: {} notification(s)", count),
                Err(e) => log::error!("Error in unpaid reminder check: {}", e),
            },
            Err(e) => log::error!("Failed to get DB connection for unpaid reminder check: {}", e),
        }

        match get_connection(&self.db_pool) {
            Ok(conn) => {
                let now = Utc::now().naive_utc();
                match jobs::purge_old_notifications(&conn, now, *config::retention::NOTIFICATION_RETENTION_DAYS) {
                    Ok(_) => {}
                    Err(e) => log::error!("Error purging old notifications: {}", e),
                }
            }
            Err(e) => log::error!("Failed to get DB connection for notification purge: {}", e),
        }
    }

    /// Runs a single outbox dispatch pass.
    pub async fn run_outbox_dispatch(&self) {
        match get_connection(&self.db_pool) {
            Ok(mut conn) => {
                let now = Utc::now().naive_utc();
                match jobs::dispatch_due(&self.bot, &mut conn, now).await {
                    Ok(0) => {}
                    Ok(sent) => log::info!("Outbox dispatch: {} notification(s) sent", sent),
                    Err(e) => log::error!("Error in outbox dispatch: {}", e),
                }
            }
            Err(e) => log::error!("Failed to get DB connection for outbox dispatch: {}", e),
        }
    }

    /// Daily loop: sleeps until the next configured hour, runs the jobs,
    /// repeats until stopped.
    async fn daily_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            let now = Local::now().naive_local();
            let next = next_daily_run(now, *config::reminder::HOUR);
            let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
            log::info!(
                "Next daily reminder run at {} (in {}s)",
                next,
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.run_daily_jobs();
        }
        log::info!("Daily reminder loop stopped");
    }

    /// Outbox loop: dispatches due notifications on a fixed interval.
    /// The first tick is skipped so startup does not race migrations.
    async fn outbox_loop(self: Arc<Self>) {
        let mut timer = interval(config::reminder::outbox_interval());
        timer.tick().await;

        while self.running.load(Ordering::SeqCst) {
            timer.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.run_outbox_dispatch().await;
        }
        log::info!("Outbox dispatch loop stopped");
    }

    /// Starts both loops in background tasks.
    pub fn spawn(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        log::info!(
            "Starting reminder scheduler (daily at {}:00, outbox every {}s)",
            *config::reminder::HOUR,
            *config::reminder::OUTBOX_INTERVAL_SECS
        );

        let daily = Arc::clone(self);
        tokio::spawn(async move {
            daily.daily_loop().await;
        });

        let outbox = Arc::clone(self);
        tokio::spawn(async move {
            outbox.outbox_loop().await;
        });
    }

    /// Stops scheduling future runs. In-flight work completes on its own;
    /// every unit commits independently, so nothing is left half-applied.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Starts the reminder scheduler in background tasks.
///
/// # Arguments
///
/// * `bot` - Telegram bot for outbox delivery
/// * `db_pool` - Shared database pool
///
/// # Returns
///
/// Handle to the scheduler for stopping it later
pub fn start_reminder_scheduler(bot: Bot, db_pool: Arc<DbPool>) -> Arc<ReminderScheduler> {
    let scheduler = Arc::new(ReminderScheduler::new(bot, db_pool));

    if ReminderScheduler::is_enabled() {
        scheduler.spawn();
    } else {
        log::info!("Reminder scheduler is disabled (REMINDERS_ENABLED=false)");
    }

    scheduler
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_next_daily_run_later_today() {
        assert_eq!(next_daily_run(dt(2026, 8, 6, 8, 30), 10), dt(2026, 8, 6, 10, 0));
    }

    #[test]
    fn test_next_daily_run_wraps_to_tomorrow() {
        assert_eq!(next_daily_run(dt(2026, 8, 6, 10, 0), 10), dt(2026, 8, 7, 10, 0));
        assert_eq!(next_daily_run(dt(2026, 8, 6, 23, 59), 10), dt(2026, 8, 7, 10, 0));
    }

    #[test]
    fn test_is_enabled_default() {
        std::env::remove_var("REMINDERS_ENABLED");
        assert!(ReminderScheduler::is_enabled());
    }

    #[test]
    fn test_scheduler_hour_never_panics() {
        // The loop must produce a future instant for any minute of the day
        let hour = *crate::core::config::reminder::HOUR;
        let now = dt(2026, 1, 1, 23, 59);
        assert!(next_daily_run(now, hour) > now);
    }
}
