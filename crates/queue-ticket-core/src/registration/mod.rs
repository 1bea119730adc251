//! Registration orchestrator: validate, guard, allocate, persist, format, notify.
//!
//! ```text
//! Validating → Authorizing → Resolving → DuplicateChecking
//!                                              │
//!                    ┌─────────────── BEGIN IMMEDIATE ───────────────┐
//!                    │ DuplicateChecking (again, under the lock)     │
//!                    │ PatientPersisting                             │
//!                    │ SequenceAllocating                            │
//!                    │ RegistrationPersisting                        │
//!                    └─────────────────── COMMIT ────────────────────┘
//!                                              │
//!                              Formatting → Notifying → Done
//! ```
//!
//! Everything inside the transaction rolls back together, so a failure after
//! allocation leaves neither a registration row nor a spent sequence number.
//! Once COMMIT succeeds the ticket is issued; notification failures are only
//! logged.

mod error;
mod guard;
mod validate;

pub use error::*;
pub use guard::*;
pub use validate::*;

use std::fmt;

use crate::allocator::{AllocationError, Deadline, RetryError, SequenceAllocator, Transient};
use crate::auth::TokenValidator;
use crate::config::TicketConfig;
use crate::db::{insert_registration, upsert_patient, Database, DbError};
use crate::models::{
    CounterKey, IssuedTicket, NewRegistration, PriorityClass, RegisteredTicket, Registration,
    RegistrationRequest, ServicePoint,
};
use crate::notify::{Notifier, VISIT_UPDATED_MESSAGE};
use crate::reference::{LookupError, ReferenceLookup};
use crate::ticket::{exceeds_width, format_ticket_code, ScanPayload};

/// Storage-touching step of a registration, reported with persistence
/// failures so the log shows where the write path broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    Resolving,
    DuplicateChecking,
    PatientPersisting,
    SequenceAllocating,
    RegistrationPersisting,
}

impl RegistrationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStage::Resolving => "resolving reference data",
            RegistrationStage::DuplicateChecking => "checking duplicates",
            RegistrationStage::PatientPersisting => "saving patient",
            RegistrationStage::SequenceAllocating => "allocating sequence",
            RegistrationStage::RegistrationPersisting => "saving registration",
        }
    }
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one attempt at the transactional part of a registration.
#[derive(Debug)]
enum AttemptError {
    Storage {
        stage: RegistrationStage,
        source: DbError,
    },
    Duplicate,
    TimedOut {
        elapsed_ms: u64,
    },
}

impl AttemptError {
    fn at(stage: RegistrationStage) -> impl Fn(DbError) -> AttemptError {
        move |source| AttemptError::Storage { stage, source }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Storage { stage, source } => write!(f, "{stage}: {source}"),
            AttemptError::Duplicate => f.write_str("duplicate registration"),
            AttemptError::TimedOut { elapsed_ms } => write!(f, "timed out after {elapsed_ms} ms"),
        }
    }
}

impl Transient for AttemptError {
    fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Storage { source, .. } if source.is_transient())
    }
}

fn lookup_error(e: LookupError) -> RegistrationError {
    match e {
        LookupError::UnknownLocalCode(code) => {
            RegistrationError::NotFound(format!("service point code {code}"))
        }
        LookupError::UnknownServicePoint(id) => {
            RegistrationError::NotFound(format!("service point {id}"))
        }
        LookupError::Database(source) => RegistrationError::Persistence {
            stage: RegistrationStage::Resolving,
            source,
        },
    }
}

/// Reference data resolved for one registration.
struct ResolvedPoint {
    point: ServicePoint,
    priority: Option<PriorityClass>,
    point_prefix: String,
    priority_prefix: String,
}

/// Issues queue tickets against one database connection.
pub struct RegistrationService<'a> {
    db: &'a mut Database,
    config: &'a TicketConfig,
    allocator: SequenceAllocator,
    notifier: Option<&'a Notifier>,
    validator: Option<&'a dyn TokenValidator>,
}

impl<'a> RegistrationService<'a> {
    /// Create a service. Tokens are checked against the database's
    /// `api_tokens` table unless another validator is supplied.
    pub fn new(db: &'a mut Database, config: &'a TicketConfig) -> Self {
        Self {
            db,
            config,
            allocator: SequenceAllocator::from_config(config),
            notifier: None,
            validator: None,
        }
    }

    /// Announce new registrations through `notifier`.
    pub fn with_notifier(mut self, notifier: &'a Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Check caller tokens with `validator` instead of the database.
    pub fn with_token_validator(mut self, validator: &'a dyn TokenValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Register a visit at a service point and issue its ticket.
    pub fn register(
        &mut self,
        token: &str,
        request: &RegistrationRequest,
    ) -> Result<RegisteredTicket, RegistrationError> {
        let deadline = Deadline::after(self.config.registration_timeout);

        // Validating
        let visit = ValidatedRegistration::from_request(request)?;

        // Authorizing
        if !self.is_authorized(token) {
            tracing::warn!(hn = %visit.hn, "Registration rejected: invalid token");
            return Err(RegistrationError::Authorization);
        }

        // Resolving
        let resolved = self.resolve(&visit)?;
        let service_point_id = resolved.point.service_point_id;

        // DuplicateChecking, before any write
        let duplicate = DuplicateGuard::new(self.db.conn())
            .has_active_duplicate(&visit.hn, &visit.vn, service_point_id)
            .map_err(|source| RegistrationError::Persistence {
                stage: RegistrationStage::DuplicateChecking,
                source,
            })?;
        if duplicate {
            return Err(self.duplicate_error(&visit, service_point_id));
        }

        // PatientPersisting, SequenceAllocating, RegistrationPersisting
        let registration = self.issue(&visit, &resolved, &deadline)?;

        // Formatting
        let scan_payload = self.scan_payload(
            &registration,
            &resolved.point,
            resolved.priority.as_ref(),
        );

        // Notifying
        if let Some(notifier) = self.notifier {
            notifier.dispatch(&self.config.notify_topic, VISIT_UPDATED_MESSAGE);
        }

        tracing::info!(
            registration_id = registration.registration_id,
            ticket_code = %registration.ticket_code,
            service_point_id,
            service_date = %registration.service_date,
            elapsed_ms = deadline.elapsed_ms(),
            "Ticket issued"
        );

        Ok(RegisteredTicket {
            registration_id: registration.registration_id,
            hn: registration.hn,
            vn: registration.vn,
            ticket_code: registration.ticket_code,
            scan_payload,
        })
    }

    /// Printable view of an issued ticket.
    pub fn get_issued_ticket(&self, registration_id: i64) -> Result<IssuedTicket, RegistrationError> {
        let registration = self
            .db
            .get_registration(registration_id)
            .map_err(|source| RegistrationError::Persistence {
                stage: RegistrationStage::Resolving,
                source,
            })?
            .ok_or_else(|| RegistrationError::NotFound(format!("registration {registration_id}")))?;

        let lookup = ReferenceLookup::new(&*self.db);
        let point = lookup
            .service_point(registration.service_point_id)
            .map_err(lookup_error)?;
        let priority = lookup.priority(registration.priority_id).map_err(lookup_error)?;

        let scan_payload = self.scan_payload(&registration, &point, priority.as_ref());

        Ok(IssuedTicket {
            registration_id,
            ticket_code: registration.ticket_code,
            scan_payload,
            hospital_name: self.config.hospital_name.clone(),
            service_point_name: point.name,
            priority_name: priority.map(|p| p.name),
            hn: registration.hn,
            vn: registration.vn,
            service_date: registration.service_date,
            service_time: registration.service_time,
            created_at: registration.created_at,
        })
    }

    fn is_authorized(&self, token: &str) -> bool {
        match self.validator {
            Some(validator) => validator.is_valid(token),
            None => self.db.is_valid(token),
        }
    }

    fn resolve(&self, visit: &ValidatedRegistration) -> Result<ResolvedPoint, RegistrationError> {
        let lookup = ReferenceLookup::new(&*self.db);

        let service_point_id = lookup
            .resolve_service_point_id(&visit.local_code)
            .map_err(lookup_error)?;
        let point = lookup.service_point(service_point_id).map_err(lookup_error)?;
        let point_prefix = lookup.point_prefix(service_point_id).map_err(lookup_error)?;
        let priority = lookup.priority(visit.priority_id).map_err(lookup_error)?;
        let priority_prefix = lookup.priority_prefix(visit.priority_id).map_err(lookup_error)?;

        if visit.priority_id.is_some() && priority.is_none() {
            tracing::debug!(priority_id = ?visit.priority_id, "Unknown priority, using default prefix");
        }

        Ok(ResolvedPoint {
            point,
            priority,
            point_prefix,
            priority_prefix,
        })
    }

    fn duplicate_error(&self, visit: &ValidatedRegistration, service_point_id: i64) -> RegistrationError {
        tracing::warn!(
            hn = %visit.hn,
            vn = %visit.vn,
            service_point_id,
            "Registration rejected: duplicate visit"
        );
        RegistrationError::Duplicate {
            hn: visit.hn.clone(),
            vn: visit.vn.clone(),
            service_point_id,
        }
    }

    /// Run the write phase in one IMMEDIATE transaction, retrying on contention.
    fn issue(
        &mut self,
        visit: &ValidatedRegistration,
        resolved: &ResolvedPoint,
        deadline: &Deadline,
    ) -> Result<Registration, RegistrationError> {
        let allocator = self.allocator;
        let digit_width = self.config.digit_width;
        let service_point_id = resolved.point.service_point_id;
        let key = CounterKey::new(service_point_id, visit.service_date);
        let db = &mut *self.db;

        let outcome = allocator
            .retry_policy()
            .run(Some(deadline), |attempt| -> Result<Registration, AttemptError> {
                let tx = db
                    .immediate_transaction()
                    .map_err(AttemptError::at(RegistrationStage::SequenceAllocating))?;

                let duplicate = DuplicateGuard::new(&tx)
                    .has_active_duplicate(&visit.hn, &visit.vn, service_point_id)
                    .map_err(AttemptError::at(RegistrationStage::DuplicateChecking))?;
                if duplicate {
                    return Err(AttemptError::Duplicate);
                }

                upsert_patient(&tx, &visit.patient)
                    .map_err(AttemptError::at(RegistrationStage::PatientPersisting))?;

                let sequence = allocator
                    .allocate(&*tx, &key)
                    .map_err(AttemptError::at(RegistrationStage::SequenceAllocating))?;

                if exceeds_width(sequence, digit_width) {
                    tracing::warn!(
                        counter = %key,
                        sequence,
                        digit_width,
                        "Sequence wider than configured digits, ticket code grows"
                    );
                }

                let ticket_code = format_ticket_code(
                    &resolved.point_prefix,
                    &resolved.priority_prefix,
                    sequence,
                    digit_width,
                );

                let registration = insert_registration(
                    &tx,
                    &NewRegistration {
                        service_point_id,
                        service_date: visit.service_date,
                        service_time: visit.service_time,
                        ticket_code,
                        sequence,
                        hn: visit.hn.clone(),
                        vn: visit.vn.clone(),
                        priority_id: visit.priority_id,
                        his_queue_ref: visit.his_queue_ref.clone(),
                        created_at: chrono::Utc::now().to_rfc3339(),
                    },
                )
                .map_err(AttemptError::at(RegistrationStage::RegistrationPersisting))?;

                if deadline.is_expired() {
                    // tx is dropped here, rolling back the allocation
                    return Err(AttemptError::TimedOut {
                        elapsed_ms: deadline.elapsed_ms(),
                    });
                }

                tx.commit()
                    .map_err(DbError::from)
                    .map_err(AttemptError::at(RegistrationStage::RegistrationPersisting))?;

                if attempt > 1 {
                    tracing::info!(attempt, counter = %key, "Registration committed after retry");
                }
                Ok(registration)
            });

        outcome.map_err(|e| match e {
            RetryError::Exhausted { attempts, .. } => {
                AllocationError::Contention { attempts }.into()
            }
            RetryError::DeadlineExceeded { elapsed_ms }
            | RetryError::Fatal(AttemptError::TimedOut { elapsed_ms }) => {
                tracing::warn!(counter = %key, elapsed_ms, "Registration timed out before commit");
                AllocationError::Timeout { elapsed_ms }.into()
            }
            RetryError::Fatal(AttemptError::Duplicate) => self.duplicate_error(visit, service_point_id),
            RetryError::Fatal(AttemptError::Storage {
                stage: RegistrationStage::SequenceAllocating,
                source,
            }) => {
                tracing::error!(counter = %key, error = %source, "Sequence allocation failed");
                AllocationError::Storage(source).into()
            }
            RetryError::Fatal(AttemptError::Storage { stage, source }) => {
                tracing::error!(counter = %key, %stage, error = %source, "Registration write failed");
                RegistrationError::Persistence { stage, source }
            }
        })
    }

    fn scan_payload(
        &self,
        registration: &Registration,
        point: &ServicePoint,
        priority: Option<&PriorityClass>,
    ) -> String {
        ScanPayload {
            hospital_id: self.config.hospital_id.clone(),
            notify_token: self.config.notify_token.clone(),
            hn: registration.hn.clone(),
            local_code: point.local_code.clone(),
            ticket_code: registration.ticket_code.clone(),
            numeric_suffix: registration.sequence,
            service_date: registration.service_date,
            service_time: registration.service_time,
            service_point_name: point.name.clone(),
            priority_name: priority.map(|p| p.name.clone()).unwrap_or_default(),
        }
        .encode()
    }
}
