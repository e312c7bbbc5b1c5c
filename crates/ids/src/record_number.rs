//! Clinical record numbers.

use crate::{IdError, IdResult};
use chrono::{DateTime, NaiveDate, Utc};
use std::{fmt, str::FromStr};
use uuid::Uuid;

const SUFFIX_LEN: usize = 8;

/// Prefix used when a clinic does not configure its own ("cartella clinica").
pub const DEFAULT_PREFIX: &str = "CC";

/// A human-readable clinical record number: `<PREFIX>-<YYYYMMDD>-<8 hex>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordNumber {
    prefix: String,
    opened_on: NaiveDate,
    suffix: String,
}

impl RecordNumber {
    /// Returns true if `prefix` is 2 to 8 uppercase ASCII letters.
    pub fn is_valid_prefix(prefix: &str) -> bool {
        (2..=8).contains(&prefix.len()) && prefix.bytes().all(|b| b.is_ascii_uppercase())
    }
}

impl fmt::Display for RecordNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.prefix,
            self.opened_on.format("%Y%m%d"),
            self.suffix
        )
    }
}

impl FromStr for RecordNumber {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('-');
        let (Some(prefix), Some(date), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(IdError::InvalidInput(format!(
                "Invalid record number format: '{}'",
                s
            )));
        };

        if !Self::is_valid_prefix(prefix) {
            return Err(IdError::InvalidInput(format!(
                "Record number prefix must be 2-8 uppercase letters: '{}'",
                prefix
            )));
        }

        let opened_on = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|e| {
            IdError::InvalidInput(format!("Invalid record number date '{}': {}", date, e))
        })?;

        let suffix_ok = suffix.len() == SUFFIX_LEN
            && suffix
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F'));
        if !suffix_ok {
            return Err(IdError::InvalidInput(format!(
                "Record number suffix must be {} uppercase hex characters: '{}'",
                SUFFIX_LEN, suffix
            )));
        }

        Ok(Self {
            prefix: prefix.to_owned(),
            opened_on,
            suffix: suffix.to_owned(),
        })
    }
}

/// Mints record numbers for one clinic prefix.
#[derive(Clone, Debug)]
pub struct RecordNumberGenerator {
    prefix: String,
}

impl RecordNumberGenerator {
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `prefix` is not 2-8 uppercase ASCII letters.
    pub fn new(prefix: &str) -> IdResult<Self> {
        if !RecordNumber::is_valid_prefix(prefix) {
            return Err(IdError::InvalidInput(format!(
                "Record number prefix must be 2-8 uppercase letters: '{}'",
                prefix
            )));
        }
        Ok(Self {
            prefix: prefix.to_owned(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generates a new record number dated `now`.
    pub fn generate(&self, now: DateTime<Utc>) -> RecordNumber {
        let hex = Uuid::new_v4().simple().to_string().to_uppercase();
        RecordNumber {
            prefix: self.prefix.clone(),
            opened_on: now.date_naive(),
            suffix: hex[..SUFFIX_LEN].to_owned(),
        }
    }
}

impl Default for RecordNumberGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap()
    }

    #[test]
    fn generate_uses_prefix_and_date() {
        let generator = RecordNumberGenerator::new("CC").unwrap();
        let number = generator.generate(fixed_now());
        let rendered = number.to_string();

        assert!(rendered.starts_with("CC-20261018-"));
        assert_eq!(rendered.len(), "CC-20261018-".len() + SUFFIX_LEN);
        assert_eq!(rendered.parse::<RecordNumber>().unwrap(), number);
    }

    #[test]
    fn generate_produces_distinct_numbers() {
        let generator = RecordNumberGenerator::new("FISIO").unwrap();
        let a = generator.generate(fixed_now());
        let b = generator.generate(fixed_now());
        assert_ne!(a, b);
    }

    #[test]
    fn new_rejects_bad_prefixes() {
        for bad in ["", "C", "cc", "C1", "TOOLONGPREFIX"] {
            assert!(RecordNumberGenerator::new(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_malformed_numbers() {
        for bad in [
            "CC20261018-1F3A9B0C",
            "CC-20261318-1F3A9B0C",
            "CC-20261018-1f3a9b0c",
            "CC-20261018-1F3A9B",
            "cc-20261018-1F3A9B0C",
            "CC-20261018-1F3A9B0C-EXTRA",
        ] {
            assert!(bad.parse::<RecordNumber>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn parse_round_trips_display_form() {
        let number: RecordNumber = " CC-20261018-1F3A9B0C ".parse().unwrap();
        assert_eq!(number.to_string(), "CC-20261018-1F3A9B0C");
    }
}
