//! Patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Patient demographics, keyed by hospital number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Hospital number from the upstream clinical system
    pub hn: String,
    /// Title / honorific
    pub title: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub sex: Option<String>,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(hn: String, first_name: String, last_name: String, birth_date: NaiveDate) -> Self {
        Self {
            hn,
            title: None,
            first_name,
            last_name,
            birth_date,
            sex: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let birth = NaiveDate::from_ymd_opt(1980, 1, 1).unwrap();
        let patient = Patient::new("123".into(), "Somchai".into(), "Jaidee".into(), birth);
        assert_eq!(patient.hn, "123");
        assert_eq!(patient.first_name, "Somchai");
        assert_eq!(patient.title, None);
        assert_eq!(patient.sex, None);
    }
}
