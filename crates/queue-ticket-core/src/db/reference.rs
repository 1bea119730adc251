//! Service point and priority database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{PriorityClass, ServicePoint};

fn service_point_from_row(row: &Row<'_>) -> rusqlite::Result<ServicePoint> {
    Ok(ServicePoint {
        service_point_id: row.get(0)?,
        local_code: row.get(1)?,
        name: row.get(2)?,
        prefix: row.get(3)?,
    })
}

fn priority_from_row(row: &Row<'_>) -> rusqlite::Result<PriorityClass> {
    Ok(PriorityClass {
        priority_id: row.get(0)?,
        name: row.get(1)?,
        prefix: row.get(2)?,
    })
}

impl Database {
    /// Insert or update a service point.
    pub fn upsert_service_point(&self, point: &ServicePoint) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO service_points (service_point_id, local_code, name, prefix)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(service_point_id) DO UPDATE SET
                local_code = excluded.local_code,
                name = excluded.name,
                prefix = excluded.prefix,
                updated_at = datetime('now')
            "#,
            params![
                point.service_point_id,
                point.local_code,
                point.name,
                point.prefix,
            ],
        )?;
        Ok(())
    }

    /// Get a service point by ID.
    pub fn get_service_point(&self, service_point_id: i64) -> DbResult<Option<ServicePoint>> {
        self.conn
            .query_row(
                r#"
                SELECT service_point_id, local_code, name, prefix
                FROM service_points
                WHERE service_point_id = ?
                "#,
                [service_point_id],
                service_point_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a service point by its upstream local code.
    pub fn get_service_point_by_local_code(&self, local_code: &str) -> DbResult<Option<ServicePoint>> {
        self.conn
            .query_row(
                r#"
                SELECT service_point_id, local_code, name, prefix
                FROM service_points
                WHERE local_code = ?
                "#,
                [local_code],
                service_point_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or update a priority class.
    pub fn upsert_priority(&self, priority: &PriorityClass) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO priorities (priority_id, name, prefix)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(priority_id) DO UPDATE SET
                name = excluded.name,
                prefix = excluded.prefix,
                updated_at = datetime('now')
            "#,
            params![priority.priority_id, priority.name, priority.prefix],
        )?;
        Ok(())
    }

    /// Get a priority class by ID.
    pub fn get_priority(&self, priority_id: i64) -> DbResult<Option<PriorityClass>> {
        self.conn
            .query_row(
                "SELECT priority_id, name, prefix FROM priorities WHERE priority_id = ?",
                [priority_id],
                priority_from_row,
            )
            .optional()
            .map_err(Into::into)
    }
}
