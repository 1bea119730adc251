//! Registration error taxonomy and its caller-facing rendering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RegistrationStage;
use crate::allocator::AllocationError;
use crate::db::DbError;

/// Message shown to callers in place of storage internals.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Registration errors.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Invalid registration: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Authorization,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate registration for hn {hn}, vn {vn} at service point {service_point_id}")]
    Duplicate {
        hn: String,
        vn: String,
        service_point_id: i64,
    },

    #[error("Allocation failed: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Persistence failed while {stage}: {source}")]
    Persistence {
        stage: RegistrationStage,
        #[source]
        source: DbError,
    },
}

/// Coarse error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    DuplicateRegistration,
    Allocation,
    Persistence,
}

/// Structured error body: a kind plus a message safe to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorResponse {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::Validation(_) => ErrorKind::Validation,
            RegistrationError::Authorization => ErrorKind::Authorization,
            RegistrationError::NotFound(_) => ErrorKind::NotFound,
            RegistrationError::Duplicate { .. } => ErrorKind::DuplicateRegistration,
            RegistrationError::Allocation(_) => ErrorKind::Allocation,
            RegistrationError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Message for callers. Storage details are replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            RegistrationError::Persistence { .. }
            | RegistrationError::Allocation(AllocationError::Storage(_)) => {
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(RegistrationError::Authorization.kind(), ErrorKind::Authorization);
        assert_eq!(
            RegistrationError::Allocation(AllocationError::Contention { attempts: 3 }).kind(),
            ErrorKind::Allocation
        );
        assert_eq!(
            RegistrationError::Duplicate {
                hn: "H1".into(),
                vn: "V1".into(),
                service_point_id: 5
            }
            .kind(),
            ErrorKind::DuplicateRegistration
        );
    }

    #[test]
    fn test_persistence_message_hides_internals() {
        let err = RegistrationError::Persistence {
            stage: RegistrationStage::RegistrationPersisting,
            source: DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows),
        };
        let response = err.to_response();

        assert_eq!(response.kind, ErrorKind::Persistence);
        assert_eq!(response.message, INTERNAL_ERROR_MESSAGE);
        assert!(err.to_string().contains("saving registration"));
    }

    #[test]
    fn test_response_json() {
        let json = RegistrationError::Validation("missing hn".into())
            .to_response()
            .to_json()
            .unwrap();
        assert_eq!(
            json,
            r#"{"kind":"validation","message":"Invalid registration: missing hn"}"#
        );
    }
}
