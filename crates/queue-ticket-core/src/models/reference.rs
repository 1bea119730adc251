//! Static reference data: service points and priority classes.

use serde::{Deserialize, Serialize};

/// Prefix used when a service point or priority has none configured.
pub const DEFAULT_PREFIX: &str = "T";

/// A clinic or department counter issuing its own ticket sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicePoint {
    pub service_point_id: i64,
    /// Code used by the upstream clinical system (unique)
    pub local_code: String,
    /// Display name printed on the ticket
    pub name: String,
    /// Ticket-code prefix, 1-2 characters
    pub prefix: Option<String>,
}

impl ServicePoint {
    pub fn new(service_point_id: i64, local_code: String, name: String) -> Self {
        Self {
            service_point_id,
            local_code,
            name,
            prefix: None,
        }
    }

    /// Prefix for ticket codes, falling back to [`DEFAULT_PREFIX`].
    pub fn ticket_prefix(&self) -> &str {
        non_blank(self.prefix.as_deref()).unwrap_or(DEFAULT_PREFIX)
    }
}

/// A priority class (e.g. normal, urgent, elderly).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityClass {
    pub priority_id: i64,
    pub name: String,
    pub prefix: Option<String>,
}

impl PriorityClass {
    pub fn new(priority_id: i64, name: String) -> Self {
        Self {
            priority_id,
            name,
            prefix: None,
        }
    }

    /// Prefix for ticket codes, falling back to [`DEFAULT_PREFIX`].
    pub fn ticket_prefix(&self) -> &str {
        non_blank(self.prefix.as_deref()).unwrap_or(DEFAULT_PREFIX)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_point_default_prefix() {
        let mut point = ServicePoint::new(5, "CLN01".into(), "Clinic A".into());
        assert_eq!(point.ticket_prefix(), "T");

        point.prefix = Some("M".into());
        assert_eq!(point.ticket_prefix(), "M");
    }

    #[test]
    fn test_blank_prefix_falls_back() {
        let mut priority = PriorityClass::new(2, "Urgent".into());
        priority.prefix = Some("".into());
        assert_eq!(priority.ticket_prefix(), "T");

        priority.prefix = Some("P".into());
        assert_eq!(priority.ticket_prefix(), "P");
    }
}
