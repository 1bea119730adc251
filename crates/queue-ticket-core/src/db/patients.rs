//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbResult};
use crate::models::Patient;

/// Insert a patient or refresh the demographics of an existing hn.
pub(crate) fn upsert_patient(conn: &Connection, patient: &Patient) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO patients (hn, title, first_name, last_name, birth_date, sex)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(hn) DO UPDATE SET
            title = excluded.title,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            birth_date = excluded.birth_date,
            sex = excluded.sex,
            updated_at = datetime('now')
        "#,
        params![
            patient.hn,
            patient.title,
            patient.first_name,
            patient.last_name,
            patient.birth_date,
            patient.sex,
        ],
    )?;
    Ok(())
}

impl Database {
    /// Insert or update a patient by hn.
    pub fn upsert_patient(&self, patient: &Patient) -> DbResult<()> {
        upsert_patient(&self.conn, patient)
    }

    /// Get a patient by hn.
    pub fn get_patient(&self, hn: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                r#"
                SELECT hn, title, first_name, last_name, birth_date, sex
                FROM patients
                WHERE hn = ?
                "#,
                [hn],
                |row| {
                    Ok(Patient {
                        hn: row.get(0)?,
                        title: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        birth_date: row.get(4)?,
                        sex: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
