//! Scan payload: the `#`-delimited string printed as a QR code on tickets.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Field delimiter. Fields are not escaped.
pub const PAYLOAD_DELIMITER: char = '#';

/// The ten payload fields, in wire order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPayload {
    pub hospital_id: String,
    pub notify_token: String,
    pub hn: String,
    pub local_code: String,
    pub ticket_code: String,
    pub numeric_suffix: u32,
    pub service_date: NaiveDate,
    pub service_time: NaiveTime,
    pub service_point_name: String,
    pub priority_name: String,
}

impl ScanPayload {
    /// Encode as `hospitalId#token#hn#localCode#ticketCode#suffix#YYYYMMDD#HHmm#point#priority`.
    pub fn encode(&self) -> String {
        let fields = [
            self.hospital_id.clone(),
            self.notify_token.clone(),
            self.hn.clone(),
            self.local_code.clone(),
            self.ticket_code.clone(),
            self.numeric_suffix.to_string(),
            self.service_date.format("%Y%m%d").to_string(),
            self.service_time.format("%H%M").to_string(),
            self.service_point_name.clone(),
            self.priority_name.clone(),
        ];
        join_payload_fields(&fields)
    }
}

impl std::fmt::Display for ScanPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Join already formatted fields with [`PAYLOAD_DELIMITER`], without validation.
pub fn join_payload_fields<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(PAYLOAD_DELIMITER);
        }
        out.push_str(field.as_ref());
    }
    out
}
