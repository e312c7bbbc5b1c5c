//! Constants used throughout the Fisio core crate.

/// Default location of the YAML data file when no explicit path is configured.
pub const DEFAULT_DATA_FILE: &str = "fisio_data/clinic.yaml";

/// Default clinical record number prefix ("cartella clinica").
pub const DEFAULT_RECORD_PREFIX: &str = fisio_ids::DEFAULT_PREFIX;

/// Page size used when a list request does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size allowed when none is configured.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Attempts made to allocate a unique generated record number.
pub const RECORD_NUMBER_ATTEMPTS: usize = 5;

/// Date format used in audit lines appended to record and session notes.
pub const NOTE_DATE_FORMAT: &str = "%Y-%m-%d";
