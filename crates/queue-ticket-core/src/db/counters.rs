//! Daily counter database operations.
//!
//! These take a bare [`Connection`] so they can run either in autocommit
//! mode or inside a caller's transaction.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::{CounterKey, DailyCounter};

/// Create the counter for `key` at 1, or bump an existing one by 1.
///
/// Returns the new value. A single statement, so no other writer can slip
/// between the existence check and the write.
pub fn increment_or_init_counter(conn: &Connection, key: &CounterKey) -> DbResult<u32> {
    let value = conn.query_row(
        r#"
        INSERT INTO daily_counters (service_point_id, service_date, current_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT(service_point_id, service_date) DO UPDATE SET
            current_value = current_value + 1,
            updated_at = datetime('now')
        RETURNING current_value
        "#,
        params![key.service_point_id, key.service_date],
        |row| row.get(0),
    )?;
    Ok(value)
}

/// Current value of the counter for `key`, `None` if nothing was issued yet.
pub fn current_counter_value(conn: &Connection, key: &CounterKey) -> DbResult<Option<u32>> {
    conn.query_row(
        r#"
        SELECT current_value FROM daily_counters
        WHERE service_point_id = ?1 AND service_date = ?2
        "#,
        params![key.service_point_id, key.service_date],
        |row| row.get(0),
    )
    .optional()
    .map_err(Into::into)
}

impl Database {
    /// Get the stored counter row for a key.
    pub fn get_daily_counter(&self, key: &CounterKey) -> DbResult<Option<DailyCounter>> {
        self.conn
            .query_row(
                r#"
                SELECT current_value, updated_at FROM daily_counters
                WHERE service_point_id = ?1 AND service_date = ?2
                "#,
                params![key.service_point_id, key.service_date],
                |row| {
                    Ok(DailyCounter {
                        key: *key,
                        current_value: row.get(0)?,
                        updated_at: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServicePoint;
    use chrono::NaiveDate;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_service_point(&ServicePoint::new(5, "CLN01".into(), "Clinic A".into()))
            .unwrap();
        db
    }

    fn key(day: u32) -> CounterKey {
        CounterKey::new(5, NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    #[test]
    fn test_first_call_initializes_to_one() {
        let db = setup_db();

        assert_eq!(current_counter_value(db.conn(), &key(1)).unwrap(), None);
        assert_eq!(increment_or_init_counter(db.conn(), &key(1)).unwrap(), 1);
        assert_eq!(current_counter_value(db.conn(), &key(1)).unwrap(), Some(1));
    }

    #[test]
    fn test_subsequent_calls_increment() {
        let db = setup_db();

        for expected in 1..=5 {
            assert_eq!(increment_or_init_counter(db.conn(), &key(1)).unwrap(), expected);
        }

        let counter = db.get_daily_counter(&key(1)).unwrap().unwrap();
        assert_eq!(counter.current_value, 5);
    }

    #[test]
    fn test_dates_are_independent() {
        let db = setup_db();

        increment_or_init_counter(db.conn(), &key(1)).unwrap();
        increment_or_init_counter(db.conn(), &key(1)).unwrap();

        assert_eq!(increment_or_init_counter(db.conn(), &key(2)).unwrap(), 1);
        assert_eq!(current_counter_value(db.conn(), &key(1)).unwrap(), Some(2));
    }

    #[test]
    fn test_unknown_service_point_rejected() {
        let db = setup_db();
        let orphan = CounterKey::new(99, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        assert!(increment_or_init_counter(db.conn(), &orphan).is_err());
    }
}
