//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read process-wide environment variables during
//! request handling.

use crate::constants::{DEFAULT_DATA_FILE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{PatientError, PatientResult};
use fisio_ids::RecordNumberGenerator;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_file: PathBuf,
    record_numbers: RecordNumberGenerator,
    default_page_size: u32,
    max_page_size: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`PatientError::Id`] if `record_prefix` is not 2-8 uppercase letters, and
    /// [`PatientError::InvalidInput`] if `max_page_size` is zero or `default_page_size` is
    /// outside `1..=max_page_size`.
    pub fn new(
        data_file: PathBuf,
        record_prefix: &str,
        default_page_size: u32,
        max_page_size: u32,
    ) -> PatientResult<Self> {
        if max_page_size == 0 {
            return Err(PatientError::InvalidInput(
                "maximum page size must be at least 1".into(),
            ));
        }
        if default_page_size == 0 || default_page_size > max_page_size {
            return Err(PatientError::InvalidInput(format!(
                "default page size must be between 1 and {max_page_size}, got {default_page_size}"
            )));
        }

        Ok(Self {
            data_file,
            record_numbers: RecordNumberGenerator::new(record_prefix)?,
            default_page_size,
            max_page_size,
        })
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn record_numbers(&self) -> &RecordNumberGenerator {
        &self.record_numbers
    }

    pub fn default_page_size(&self) -> u32 {
        self.default_page_size
    }

    /// Largest page a list request may ask for.
    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            record_numbers: RecordNumberGenerator::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Parse a page size from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns `default`.
pub fn page_size_from_env_value(value: Option<String>, default: u32) -> PatientResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(v) => v.parse::<u32>().map_err(|e| {
            PatientError::InvalidInput(format!("page size must be a positive integer: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn default_uses_cc_prefix() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.record_numbers().prefix(), crate::constants::DEFAULT_RECORD_PREFIX);
        assert_eq!(cfg.default_page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.max_page_size(), MAX_PAGE_SIZE);
    }

    #[test]
    fn new_rejects_bad_prefix() {
        let err = CoreConfig::new(PathBuf::from("x.yaml"), "cc", 20, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn new_rejects_out_of_range_page_size() {
        assert!(CoreConfig::new(PathBuf::from("x.yaml"), "CC", 0, 100).is_err());
        assert!(CoreConfig::new(PathBuf::from("x.yaml"), "CC", 51, 50).is_err());
        assert!(CoreConfig::new(PathBuf::from("x.yaml"), "CC", 20, 0).is_err());

        let cfg = CoreConfig::new(PathBuf::from("x.yaml"), "CC", 200, 500).unwrap();
        assert_eq!(cfg.max_page_size(), 500);
    }

    #[test]
    fn page_size_from_env_value_defaults_when_blank() {
        assert_eq!(page_size_from_env_value(None, DEFAULT_PAGE_SIZE).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(
            page_size_from_env_value(Some("  ".into()), MAX_PAGE_SIZE).unwrap(),
            MAX_PAGE_SIZE
        );
        assert_eq!(page_size_from_env_value(Some("50".into()), DEFAULT_PAGE_SIZE).unwrap(), 50);
        assert!(page_size_from_env_value(Some("fifty".into()), DEFAULT_PAGE_SIZE).is_err());
    }
}
