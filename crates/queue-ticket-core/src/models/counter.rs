//! Per-day sequence counters.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Key of a daily counter: one sequence per service point per service date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub service_point_id: i64,
    pub service_date: NaiveDate,
}

impl CounterKey {
    pub fn new(service_point_id: i64, service_date: NaiveDate) -> Self {
        Self {
            service_point_id,
            service_date,
        }
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.service_point_id, self.service_date)
    }
}

/// Stored state of a daily counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCounter {
    pub key: CounterKey,
    /// Last sequence handed out for this key
    pub current_value: u32,
    pub updated_at: String,
}
