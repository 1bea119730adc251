//! Domain models for queue ticket issuance.

mod counter;
mod patient;
mod reference;
mod registration;

pub use counter::*;
pub use patient::*;
pub use reference::*;
pub use registration::*;
