//! Boundary validation of registration requests.

use chrono::{NaiveDate, NaiveTime};

use super::RegistrationError;
use crate::models::{Patient, RegistrationRequest};

/// A request with every required field present and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRegistration {
    pub hn: String,
    pub vn: String,
    pub local_code: String,
    pub priority_id: Option<i64>,
    pub service_date: NaiveDate,
    pub service_time: NaiveTime,
    pub his_queue_ref: Option<String>,
    pub patient: Patient,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RegistrationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| RegistrationError::Validation(format!("{field} must be YYYY-MM-DD, got {value:?}")))
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, RegistrationError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| RegistrationError::Validation(format!("{field} must be HH:MM[:SS], got {value:?}")))
}

impl ValidatedRegistration {
    /// Check required fields and parse dates. Reports every missing field at once.
    pub fn from_request(request: &RegistrationRequest) -> Result<Self, RegistrationError> {
        let required = [
            ("hn", present(&request.hn)),
            ("vn", present(&request.vn)),
            ("local_code", present(&request.local_code)),
            ("service_date", present(&request.service_date)),
            ("service_time", present(&request.service_time)),
            ("first_name", present(&request.first_name)),
            ("last_name", present(&request.last_name)),
            ("birth_date", present(&request.birth_date)),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(RegistrationError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let [hn, vn, local_code, service_date, service_time, first_name, last_name, birth_date] =
            required.map(|(_, value)| value.unwrap_or_default());

        let service_date = parse_date("service_date", &service_date)?;
        let service_time = parse_time("service_time", &service_time)?;
        let birth_date = parse_date("birth_date", &birth_date)?;

        let mut patient = Patient::new(hn.clone(), first_name, last_name, birth_date);
        patient.title = present(&request.title);
        patient.sex = present(&request.sex);

        Ok(Self {
            hn,
            vn,
            local_code,
            priority_id: request.priority_id,
            service_date,
            service_time,
            his_queue_ref: present(&request.his_queue_ref),
            patient,
        })
    }
}
