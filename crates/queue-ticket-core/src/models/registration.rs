//! Registration models: the request that issues a ticket, the stored row,
//! and the views handed back to callers.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Registration input as received from the upstream clinical system.
///
/// Every field is optional here; the orchestrator decides which are
/// required and rejects the request before touching storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrationRequest {
    pub hn: Option<String>,
    pub vn: Option<String>,
    /// Service point code in the upstream system
    pub local_code: Option<String>,
    pub priority_id: Option<i64>,
    /// `YYYY-MM-DD`
    pub service_date: Option<String>,
    /// `HH:MM:SS` or `HH:MM`
    pub service_time: Option<String>,
    /// Queue number assigned by the upstream system, if any
    pub his_queue_ref: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    /// `YYYY-MM-DD`
    pub birth_date: Option<String>,
    pub sex: Option<String>,
}

/// A registration about to be written. Becomes a [`Registration`] on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub service_point_id: i64,
    pub service_date: NaiveDate,
    pub service_time: NaiveTime,
    pub ticket_code: String,
    pub sequence: u32,
    pub hn: String,
    pub vn: String,
    pub priority_id: Option<i64>,
    pub his_queue_ref: Option<String>,
    pub created_at: String,
}

/// One issued ticket (append-only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registration {
    pub registration_id: i64,
    pub service_point_id: i64,
    pub service_date: NaiveDate,
    pub service_time: NaiveTime,
    pub ticket_code: String,
    /// Sequence the ticket code was formatted from
    pub sequence: u32,
    pub hn: String,
    pub vn: String,
    pub priority_id: Option<i64>,
    pub his_queue_ref: Option<String>,
    pub created_at: String,
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisteredTicket {
    pub registration_id: i64,
    pub hn: String,
    pub vn: String,
    pub ticket_code: String,
    pub scan_payload: String,
}

/// Printable view of an already issued ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedTicket {
    pub registration_id: i64,
    pub ticket_code: String,
    pub scan_payload: String,
    pub hospital_name: String,
    pub service_point_name: String,
    pub priority_name: Option<String>,
    pub hn: String,
    pub vn: String,
    pub service_date: NaiveDate,
    pub service_time: NaiveTime,
    pub created_at: String,
}
