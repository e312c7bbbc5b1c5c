//! Identifier utilities.
//!
//! Entities are keyed by UUID v4. Clinical records additionally carry a
//! human-readable *record number* printed on the chart, of the form:
//!
//! `<PREFIX>-<YYYYMMDD>-<8 uppercase hex>`
//!
//! Example: `CC-20261018-1F3A9B0C`
//!
//! The prefix is 2 to 8 uppercase ASCII letters chosen per clinic. The date is the
//! opening date; the hex suffix is taken from a fresh UUID, so two numbers minted on
//! the same day collide only with negligible probability. Callers that need a hard
//! guarantee must still check uniqueness against storage and retry.
//!
//! Externally supplied identifiers (CLI arguments, imports) go through
//! [`parse_entity_id`], which accepts both the hyphenated and the 32-hex form.

mod record_number;

pub use record_number::{RecordNumber, RecordNumberGenerator, DEFAULT_PREFIX};
pub use uuid::Uuid;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;

/// Parses an entity id in hyphenated or simple (32 hex) form.
pub fn parse_entity_id(input: &str) -> IdResult<Uuid> {
    let trimmed = input.trim();
    let well_formed = matches!(trimmed.len(), 32 | 36)
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_hexdigit() || b == b'-');
    if !well_formed {
        return Err(IdError::InvalidInput(format!(
            "entity id must be a UUID (hyphenated or 32 hex characters), got: '{}'",
            input
        )));
    }

    Uuid::parse_str(trimmed)
        .map_err(|e| IdError::InvalidInput(format!("invalid entity id '{}': {}", input, e)))
}
