//! Duplicate guard: one ticket per patient visit per service point.

use rusqlite::Connection;

use crate::db::{count_visit_registrations, DbResult};

/// Checks for an existing registration of the same (hn, vn, service point).
pub struct DuplicateGuard<'a> {
    conn: &'a Connection,
}

impl<'a> DuplicateGuard<'a> {
    /// Guard reading through `conn`, which may be an open transaction.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// True if this visit already holds a ticket for the service point.
    pub fn has_active_duplicate(&self, hn: &str, vn: &str, service_point_id: i64) -> DbResult<bool> {
        Ok(count_visit_registrations(self.conn, hn, vn, service_point_id)? > 0)
    }
}
