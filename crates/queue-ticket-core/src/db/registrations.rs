//! Registration database operations.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{NewRegistration, Registration};

fn registration_from_row(row: &Row<'_>) -> rusqlite::Result<Registration> {
    Ok(Registration {
        registration_id: row.get(0)?,
        service_point_id: row.get(1)?,
        service_date: row.get(2)?,
        service_time: row.get(3)?,
        ticket_code: row.get(4)?,
        sequence: row.get(5)?,
        hn: row.get(6)?,
        vn: row.get(7)?,
        priority_id: row.get(8)?,
        his_queue_ref: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Number of registrations already issued for this patient visit at a service point.
pub fn count_visit_registrations(
    conn: &Connection,
    hn: &str,
    vn: &str,
    service_point_id: i64,
) -> DbResult<u32> {
    let count = conn.query_row(
        r#"
        SELECT COUNT(*) FROM registrations
        WHERE hn = ?1 AND vn = ?2 AND service_point_id = ?3
        "#,
        params![hn, vn, service_point_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Append a registration row.
pub fn insert_registration(conn: &Connection, registration: &NewRegistration) -> DbResult<Registration> {
    conn.execute(
        r#"
        INSERT INTO registrations (
            service_point_id, service_date, service_time, ticket_code, sequence,
            hn, vn, priority_id, his_queue_ref, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            registration.service_point_id,
            registration.service_date,
            registration.service_time,
            registration.ticket_code,
            registration.sequence,
            registration.hn,
            registration.vn,
            registration.priority_id,
            registration.his_queue_ref,
            registration.created_at,
        ],
    )?;

    Ok(Registration {
        registration_id: conn.last_insert_rowid(),
        service_point_id: registration.service_point_id,
        service_date: registration.service_date,
        service_time: registration.service_time,
        ticket_code: registration.ticket_code.clone(),
        sequence: registration.sequence,
        hn: registration.hn.clone(),
        vn: registration.vn.clone(),
        priority_id: registration.priority_id,
        his_queue_ref: registration.his_queue_ref.clone(),
        created_at: registration.created_at.clone(),
    })
}

impl Database {
    /// Get a registration by ID.
    pub fn get_registration(&self, registration_id: i64) -> DbResult<Option<Registration>> {
        self.conn
            .query_row(
                r#"
                SELECT registration_id, service_point_id, service_date, service_time,
                       ticket_code, sequence, hn, vn, priority_id, his_queue_ref, created_at
                FROM registrations
                WHERE registration_id = ?
                "#,
                [registration_id],
                registration_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List registrations for a service point on a date, in issue order.
    pub fn list_registrations(
        &self,
        service_point_id: i64,
        service_date: NaiveDate,
    ) -> DbResult<Vec<Registration>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT registration_id, service_point_id, service_date, service_time,
                   ticket_code, sequence, hn, vn, priority_id, his_queue_ref, created_at
            FROM registrations
            WHERE service_point_id = ?1 AND service_date = ?2
            ORDER BY sequence
            "#,
        )?;

        let rows = stmt.query_map(params![service_point_id, service_date], registration_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Count registrations matching a patient visit at a service point.
    pub fn count_visit_registrations(&self, hn: &str, vn: &str, service_point_id: i64) -> DbResult<u32> {
        count_visit_registrations(&self.conn, hn, vn, service_point_id)
    }
}
