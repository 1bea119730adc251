//! Ticket formatting: human-facing codes and machine-readable scan payloads.

mod format;
mod payload;

pub use format::*;
pub use payload::*;

use thiserror::Error;

/// Ticket formatting errors.
#[derive(Error, Debug, PartialEq)]
pub enum TicketFormatError {
    #[error("Ticket code {code:?} is shorter than {expected} characters")]
    TooShort { code: String, expected: usize },

    #[error("Ticket code {code:?} has a non-numeric suffix")]
    NotNumeric { code: String },
}
