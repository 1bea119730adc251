//! Queue Ticket Core Library
//!
//! Walk-in queue ticket issuance for hospital service points: every patient
//! visit registered at a service point gets a short human-readable ticket code
//! and a scan payload for the downstream notification app.
//!
//! # Architecture
//!
//! ```text
//! HIS request → validate → authorize → resolve service point / priority
//!                                                  │
//!                               ┌──────────────────▼──────────────────┐
//!                               │        BEGIN IMMEDIATE              │
//!                               │  duplicate guard (hn, vn, point)    │
//!                               │  upsert patient                     │
//!                               │  daily counter: increment-or-init   │
//!                               │  insert registration (append-only)  │
//!                               │        COMMIT                       │
//!                               └──────────────────┬──────────────────┘
//!                                                  │
//!                                    ticket code + scan payload
//!                                                  │
//!                                  "update visit" on the queue topic
//! ```
//!
//! # Core Principle
//!
//! **Sequence numbers per (service point, date) are unique and gapless.** A
//! number is only spent when its registration commits.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage for reference data, counters and registrations
//! - [`models`]: Domain types (ServicePoint, Patient, Registration, etc.)
//! - [`allocator`]: Daily sequence allocation with bounded retry
//! - [`ticket`]: Ticket code formatting and scan payload encoding
//! - [`registration`]: The end-to-end registration workflow
//! - [`reference`], [`auth`], [`notify`], [`config`]: supporting services

pub mod allocator;
pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod reference;
pub mod registration;
pub mod ticket;

// Re-export commonly used types
pub use allocator::{AllocationError, CounterStore, RetryPolicy, SequenceAllocator};
pub use config::{ConfigError, TicketConfig};
pub use db::Database;
pub use models::{
    CounterKey, IssuedTicket, Patient, PriorityClass, RegisteredTicket, Registration,
    RegistrationRequest, ServicePoint,
};
pub use notify::{BroadcastBus, NotificationBus, Notifier};
pub use registration::{ErrorKind, ErrorResponse, RegistrationError, RegistrationService};
pub use ticket::{extract_numeric_suffix, format_ticket_code, ScanPayload};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};
use std::time::Duration;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum QueueTicketError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate registration: {0}")]
    Duplicate(String),

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RegistrationError> for QueueTicketError {
    fn from(e: RegistrationError) -> Self {
        let message = e.public_message();
        match e.kind() {
            ErrorKind::Validation => QueueTicketError::Validation(message),
            ErrorKind::Authorization => QueueTicketError::Unauthorized,
            ErrorKind::NotFound => QueueTicketError::NotFound(message),
            ErrorKind::DuplicateRegistration => QueueTicketError::Duplicate(message),
            ErrorKind::Allocation => QueueTicketError::Allocation(message),
            ErrorKind::Persistence => QueueTicketError::Internal(message),
        }
    }
}

impl From<db::DbError> for QueueTicketError {
    fn from(e: db::DbError) -> Self {
        tracing::error!(error = %e, "Storage error");
        QueueTicketError::Internal(registration::INTERNAL_ERROR_MESSAGE.to_string())
    }
}

impl From<ConfigError> for QueueTicketError {
    fn from(e: ConfigError) -> Self {
        QueueTicketError::Configuration(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for QueueTicketError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        QueueTicketError::Internal(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Read configuration from the environment (and `.env`, if present).
#[uniffi::export]
pub fn load_config_from_env() -> Result<FfiTicketConfig, QueueTicketError> {
    Ok(TicketConfig::from_env()?.into())
}

/// Open or create a queue store at the given path.
///
/// Several stores may open the same file; allocation stays unique across them.
#[uniffi::export]
pub fn open_queue_store(
    path: String,
    config: FfiTicketConfig,
) -> Result<Arc<QueueTicketCore>, QueueTicketError> {
    let config = TicketConfig::try_from(config)?;
    let db = Database::open_with_busy_timeout(&path, config.busy_timeout)?;
    tracing::info!(path = %path, hospital_id = %config.hospital_id, "Queue store opened");
    Ok(Arc::new(QueueTicketCore::new(db, config)))
}

/// Create an in-memory queue store (for testing).
#[uniffi::export]
pub fn open_queue_store_in_memory(
    config: FfiTicketConfig,
) -> Result<Arc<QueueTicketCore>, QueueTicketError> {
    let config = TicketConfig::try_from(config)?;
    let db = Database::open_in_memory()?;
    Ok(Arc::new(QueueTicketCore::new(db, config)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe ticket issuer for FFI.
#[derive(uniffi::Object)]
pub struct QueueTicketCore {
    db: Arc<Mutex<Database>>,
    config: TicketConfig,
    bus: Arc<BroadcastBus>,
    notifier: Notifier,
}

impl QueueTicketCore {
    fn new(db: Database, config: TicketConfig) -> Self {
        let bus = Arc::new(BroadcastBus::default());
        let notifier = Notifier::new(bus.clone());
        Self {
            db: Arc::new(Mutex::new(db)),
            config,
            bus,
            notifier,
        }
    }

    /// In-process bus carrying "update visit" announcements.
    pub fn notification_bus(&self) -> Arc<BroadcastBus> {
        Arc::clone(&self.bus)
    }
}

#[uniffi::export]
impl QueueTicketCore {
    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a visit and issue its queue ticket.
    pub fn register(
        &self,
        token: String,
        request: FfiRegistrationRequest,
    ) -> Result<FfiRegisteredTicket, QueueTicketError> {
        let mut db = self.db.lock()?;
        let mut service =
            RegistrationService::new(&mut db, &self.config).with_notifier(&self.notifier);
        let ticket = service.register(&token, &request.into())?;
        Ok(ticket.into())
    }

    /// Printable view of a previously issued ticket.
    pub fn get_issued_ticket(
        &self,
        registration_id: i64,
    ) -> Result<FfiIssuedTicket, QueueTicketError> {
        let mut db = self.db.lock()?;
        let service = RegistrationService::new(&mut db, &self.config);
        Ok(service.get_issued_ticket(registration_id)?.into())
    }

    // =========================================================================
    // Reference Data
    // =========================================================================

    /// Add or update a service point.
    pub fn upsert_service_point(
        &self,
        service_point_id: i64,
        local_code: String,
        name: String,
        prefix: Option<String>,
    ) -> Result<(), QueueTicketError> {
        let db = self.db.lock()?;
        let mut point = ServicePoint::new(service_point_id, local_code, name);
        point.prefix = prefix;
        db.upsert_service_point(&point)?;
        Ok(())
    }

    /// Add or update a priority class.
    pub fn upsert_priority(
        &self,
        priority_id: i64,
        name: String,
        prefix: Option<String>,
    ) -> Result<(), QueueTicketError> {
        let db = self.db.lock()?;
        let mut priority = PriorityClass::new(priority_id, name);
        priority.prefix = prefix;
        db.upsert_priority(&priority)?;
        Ok(())
    }

    /// Allow a caller token to issue tickets.
    pub fn add_api_token(&self, token: String) -> Result<(), QueueTicketError> {
        if token.trim().is_empty() {
            return Err(QueueTicketError::Validation("token must not be blank".into()));
        }
        let db = self.db.lock()?;
        db.add_api_token(&token)?;
        Ok(())
    }

    /// Withdraw a caller token. Returns false if it was not active.
    pub fn revoke_api_token(&self, token: String) -> Result<bool, QueueTicketError> {
        let db = self.db.lock()?;
        Ok(db.revoke_api_token(&token)?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe configuration. Durations are in milliseconds.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTicketConfig {
    pub digit_width: u32,
    pub hospital_id: String,
    pub hospital_name: String,
    pub notify_token: String,
    pub notify_topic: String,
    pub max_allocation_attempts: u32,
    pub retry_backoff_ms: u64,
    pub busy_timeout_ms: u64,
    pub registration_timeout_ms: u64,
}

impl From<TicketConfig> for FfiTicketConfig {
    fn from(config: TicketConfig) -> Self {
        Self {
            digit_width: config.digit_width as u32,
            hospital_id: config.hospital_id,
            hospital_name: config.hospital_name,
            notify_token: config.notify_token,
            notify_topic: config.notify_topic,
            max_allocation_attempts: config.max_allocation_attempts,
            retry_backoff_ms: config.retry_backoff.as_millis() as u64,
            busy_timeout_ms: config.busy_timeout.as_millis() as u64,
            registration_timeout_ms: config.registration_timeout.as_millis() as u64,
        }
    }
}

impl TryFrom<FfiTicketConfig> for TicketConfig {
    type Error = ConfigError;

    fn try_from(config: FfiTicketConfig) -> Result<Self, Self::Error> {
        for (key, value) in [
            ("digit_width", u64::from(config.digit_width)),
            ("registration_timeout_ms", config.registration_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                });
            }
        }
        for (key, value) in [
            ("hospital_id", &config.hospital_id),
            ("notify_token", &config.notify_token),
            ("notify_topic", &config.notify_topic),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        Ok(TicketConfig {
            digit_width: config.digit_width as usize,
            hospital_id: config.hospital_id,
            hospital_name: config.hospital_name,
            notify_token: config.notify_token,
            notify_topic: config.notify_topic,
            max_allocation_attempts: config.max_allocation_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            registration_timeout: Duration::from_millis(config.registration_timeout_ms),
        })
    }
}

/// FFI-safe registration request. Dates are `YYYY-MM-DD`, times `HH:MM[:SS]`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegistrationRequest {
    pub hn: Option<String>,
    pub vn: Option<String>,
    pub local_code: Option<String>,
    pub priority_id: Option<i64>,
    pub service_date: Option<String>,
    pub service_time: Option<String>,
    pub his_queue_ref: Option<String>,
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
}

impl From<FfiRegistrationRequest> for RegistrationRequest {
    fn from(request: FfiRegistrationRequest) -> Self {
        RegistrationRequest {
            hn: request.hn,
            vn: request.vn,
            local_code: request.local_code,
            priority_id: request.priority_id,
            service_date: request.service_date,
            service_time: request.service_time,
            his_queue_ref: request.his_queue_ref,
            first_name: request.first_name,
            last_name: request.last_name,
            title: request.title,
            birth_date: request.birth_date,
            sex: request.sex,
        }
    }
}

/// FFI-safe result of a registration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRegisteredTicket {
    pub registration_id: i64,
    pub hn: String,
    pub vn: String,
    pub ticket_code: String,
    pub scan_payload: String,
}

impl From<RegisteredTicket> for FfiRegisteredTicket {
    fn from(ticket: RegisteredTicket) -> Self {
        Self {
            registration_id: ticket.registration_id,
            hn: ticket.hn,
            vn: ticket.vn,
            ticket_code: ticket.ticket_code,
            scan_payload: ticket.scan_payload,
        }
    }
}

/// FFI-safe printable ticket.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIssuedTicket {
    pub registration_id: i64,
    pub ticket_code: String,
    pub scan_payload: String,
    pub hospital_name: String,
    pub service_point_name: String,
    pub priority_name: Option<String>,
    pub hn: String,
    pub vn: String,
    pub service_date: String,
    pub service_time: String,
    pub created_at: String,
}

impl From<IssuedTicket> for FfiIssuedTicket {
    fn from(ticket: IssuedTicket) -> Self {
        Self {
            registration_id: ticket.registration_id,
            ticket_code: ticket.ticket_code,
            scan_payload: ticket.scan_payload,
            hospital_name: ticket.hospital_name,
            service_point_name: ticket.service_point_name,
            priority_name: ticket.priority_name,
            hn: ticket.hn,
            vn: ticket.vn,
            service_date: ticket.service_date.format("%Y-%m-%d").to_string(),
            service_time: ticket.service_time.format("%H:%M").to_string(),
            created_at: ticket.created_at,
        }
    }
}
