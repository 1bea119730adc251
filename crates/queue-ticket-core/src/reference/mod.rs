//! Reference lookup: service points and priority prefixes.
//!
//! Read-only views over static reference data. Nothing here writes, so calls
//! may interleave freely with allocations on other connections.

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{PriorityClass, ServicePoint, DEFAULT_PREFIX};

/// Lookup errors.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unknown service point code: {0}")]
    UnknownLocalCode(String),

    #[error("Unknown service point: {0}")]
    UnknownServicePoint(i64),
}

pub type LookupResult<T> = Result<T, LookupError>;

/// Resolves service points and ticket prefixes.
pub struct ReferenceLookup<'a> {
    db: &'a Database,
}

impl<'a> ReferenceLookup<'a> {
    /// Create a new lookup over the given database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Map an upstream local code to the internal service point ID.
    pub fn resolve_service_point_id(&self, local_code: &str) -> LookupResult<i64> {
        self.db
            .get_service_point_by_local_code(local_code)?
            .map(|point| point.service_point_id)
            .ok_or_else(|| LookupError::UnknownLocalCode(local_code.to_string()))
    }

    /// Full service point record.
    pub fn service_point(&self, service_point_id: i64) -> LookupResult<ServicePoint> {
        self.db
            .get_service_point(service_point_id)?
            .ok_or(LookupError::UnknownServicePoint(service_point_id))
    }

    /// Ticket prefix of a service point (`"T"` when none is configured).
    pub fn point_prefix(&self, service_point_id: i64) -> LookupResult<String> {
        Ok(self.service_point(service_point_id)?.ticket_prefix().to_string())
    }

    /// Priority class record; `None` when the ID is absent or unknown.
    pub fn priority(&self, priority_id: Option<i64>) -> LookupResult<Option<PriorityClass>> {
        match priority_id {
            Some(id) => Ok(self.db.get_priority(id)?),
            None => Ok(None),
        }
    }

    /// Ticket prefix of a priority (`"T"` when unset, absent or unknown).
    pub fn priority_prefix(&self, priority_id: Option<i64>) -> LookupResult<String> {
        Ok(self
            .priority(priority_id)?
            .map(|p| p.ticket_prefix().to_string())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut clinic = ServicePoint::new(5, "CLN01".into(), "Clinic A".into());
        clinic.prefix = Some("M".into());
        db.upsert_service_point(&clinic).unwrap();
        db.upsert_service_point(&ServicePoint::new(6, "CLN02".into(), "Clinic B".into()))
            .unwrap();

        let mut urgent = PriorityClass::new(2, "Urgent".into());
        urgent.prefix = Some("P".into());
        db.upsert_priority(&urgent).unwrap();
        db.upsert_priority(&PriorityClass::new(1, "Normal".into())).unwrap();

        db
    }

    #[test]
    fn test_resolve_service_point_id() {
        let db = setup_db();
        let lookup = ReferenceLookup::new(&db);

        assert_eq!(lookup.resolve_service_point_id("CLN01").unwrap(), 5);
        assert!(matches!(
            lookup.resolve_service_point_id("XYZ"),
            Err(LookupError::UnknownLocalCode(code)) if code == "XYZ"
        ));
    }

    #[test]
    fn test_point_prefix() {
        let db = setup_db();
        let lookup = ReferenceLookup::new(&db);

        assert_eq!(lookup.point_prefix(5).unwrap(), "M");
        assert_eq!(lookup.point_prefix(6).unwrap(), "T");
        assert!(matches!(
            lookup.point_prefix(99),
            Err(LookupError::UnknownServicePoint(99))
        ));
    }

    #[test]
    fn test_priority_prefix_defaults() {
        let db = setup_db();
        let lookup = ReferenceLookup::new(&db);

        assert_eq!(lookup.priority_prefix(Some(2)).unwrap(), "P");
        assert_eq!(lookup.priority_prefix(Some(1)).unwrap(), "T");
        assert_eq!(lookup.priority_prefix(Some(404)).unwrap(), "T");
        assert_eq!(lookup.priority_prefix(None).unwrap(), "T");
    }
}
