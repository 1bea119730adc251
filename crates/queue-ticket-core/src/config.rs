//! Runtime configuration for ticket issuance.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Settings supplied by the deployment, never hard-coded in the allocation logic.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketConfig {
    /// Zero-padded width of the sequence part of a ticket code.
    pub digit_width: usize,
    /// Hospital / system identifier, first field of the scan payload.
    pub hospital_id: String,
    /// Hospital name shown on printed tickets.
    pub hospital_name: String,
    /// Token embedded in the scan payload for the notification service.
    pub notify_token: String,
    /// Bus topic announcing new registrations.
    pub notify_topic: String,
    pub max_allocation_attempts: u32,
    pub retry_backoff: Duration,
    /// How long a connection waits on the database write lock.
    pub busy_timeout: Duration,
    /// Overall budget for one registration.
    pub registration_timeout: Duration,
}

impl TicketConfig {
    pub const DEFAULT_DIGIT_WIDTH: usize = 3;

    /// Configuration with the required values and defaults for the rest.
    pub fn new(
        hospital_id: impl Into<String>,
        notify_token: impl Into<String>,
        notify_topic: impl Into<String>,
    ) -> Self {
        Self {
            digit_width: Self::DEFAULT_DIGIT_WIDTH,
            hospital_id: hospital_id.into(),
            hospital_name: String::new(),
            notify_token: notify_token.into(),
            notify_topic: notify_topic.into(),
            max_allocation_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            busy_timeout: crate::db::DEFAULT_BUSY_TIMEOUT,
            registration_timeout: Duration::from_secs(10),
        }
    }

    /// Load configuration from environment variables, reading `.env` first if present.
    ///
    /// | Env Var                       | Default  |
    /// |-------------------------------|----------|
    /// | `QUEUE_DIGIT`                 | `3`      |
    /// | `HOSPITAL_ID`                 | required |
    /// | `HOSPITAL_NAME`               | empty    |
    /// | `Q4U_NOTIFY_TOKEN`            | required |
    /// | `QUEUE_CENTER_TOPIC`          | required |
    /// | `ALLOCATION_MAX_ATTEMPTS`     | `3`      |
    /// | `ALLOCATION_RETRY_BACKOFF_MS` | `50`     |
    /// | `DB_BUSY_TIMEOUT_MS`          | `5000`   |
    /// | `REGISTRATION_TIMEOUT_MS`     | `10000`  |
    ///
    /// `QUEUE_DIGIT`, `ALLOCATION_MAX_ATTEMPTS` and `REGISTRATION_TIMEOUT_MS`
    /// must be at least 1.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut config = Self::new(
            required("HOSPITAL_ID")?,
            required("Q4U_NOTIFY_TOKEN")?,
            required("QUEUE_CENTER_TOPIC")?,
        );

        if let Some(name) = get("HOSPITAL_NAME") {
            config.hospital_name = name;
        }
        if let Some(width) = get("QUEUE_DIGIT") {
            config.digit_width = parse_at_least_one("QUEUE_DIGIT", &width)? as usize;
        }
        if let Some(attempts) = get("ALLOCATION_MAX_ATTEMPTS") {
            config.max_allocation_attempts = parse_at_least_one("ALLOCATION_MAX_ATTEMPTS", &attempts)? as u32;
        }
        if let Some(ms) = get("ALLOCATION_RETRY_BACKOFF_MS") {
            config.retry_backoff = parse_millis("ALLOCATION_RETRY_BACKOFF_MS", &ms)?;
        }
        if let Some(ms) = get("DB_BUSY_TIMEOUT_MS") {
            config.busy_timeout = parse_millis("DB_BUSY_TIMEOUT_MS", &ms)?;
        }
        if let Some(ms) = get("REGISTRATION_TIMEOUT_MS") {
            config.registration_timeout =
                Duration::from_millis(parse_at_least_one("REGISTRATION_TIMEOUT_MS", &ms)?);
        }

        Ok(config)
    }
}

fn parse_at_least_one(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(n) if (1..=u32::MAX as u64).contains(&n) => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("HOSPITAL_ID", "H1"),
            ("Q4U_NOTIFY_TOKEN", "TKN"),
            ("QUEUE_CENTER_TOPIC", "queue/center"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = TicketConfig::from_lookup(lookup_from(&required())).unwrap();

        assert_eq!(config.digit_width, 3);
        assert_eq!(config.hospital_id, "H1");
        assert_eq!(config.notify_token, "TKN");
        assert_eq!(config.notify_topic, "queue/center");
        assert_eq!(config.hospital_name, "");
        assert_eq!(config.max_allocation_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(50));
        assert_eq!(config.registration_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = required();
        pairs.extend([
            ("QUEUE_DIGIT", "4"),
            ("HOSPITAL_NAME", "General Hospital"),
            ("ALLOCATION_MAX_ATTEMPTS", "5"),
            ("DB_BUSY_TIMEOUT_MS", "250"),
        ]);
        let config = TicketConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.digit_width, 4);
        assert_eq!(config.hospital_name, "General Hospital");
        assert_eq!(config.max_allocation_attempts, 5);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_required() {
        let err = TicketConfig::from_lookup(lookup_from(&[("HOSPITAL_ID", "H1")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("Q4U_NOTIFY_TOKEN"));
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let mut pairs = required();
        pairs[0] = ("HOSPITAL_ID", "  ");
        let err = TicketConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("HOSPITAL_ID"));
    }

    #[test]
    fn test_zero_registration_timeout_rejected() {
        let mut pairs = required();
        pairs.push(("REGISTRATION_TIMEOUT_MS", "0"));
        let err = TicketConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "REGISTRATION_TIMEOUT_MS",
                value: "0".into()
            }
        );

        let mut pairs = required();
        pairs.push(("REGISTRATION_TIMEOUT_MS", "1500"));
        let config = TicketConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.registration_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_invalid_digit_width() {
        for bad in ["0", "-1", "three"] {
            let mut pairs = required();
            pairs.push(("QUEUE_DIGIT", bad));
            let err = TicketConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "QUEUE_DIGIT", .. }));
        }
    }
}
