use chrono::{DateTime, Datelike, NaiveDate, Utc};
use fisio_types::{EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{PatientError, PatientResult};

/// Administrative sex as recorded on the fiscal code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Ok(Gender::Male),
            "F" | "FEMALE" => Ok(Gender::Female),
            "O" | "OTHER" => Ok(Gender::Other),
            other => Err(PatientError::InvalidInput(format!(
                "unknown gender '{other}' (expected M, F or O)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub first_name: NonEmptyText,
    pub last_name: NonEmptyText,
    /// Normalised (uppercase, no whitespace) when present.
    #[serde(default)]
    pub fiscal_code: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub email: Option<EmailAddress>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Completed years of age on `today`, if the birth date is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birth_date.and_then(|birth| age_on(birth, today))
    }
}

/// Completed years between `birth` and `today`; `None` if `birth` lies in the future.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    if birth > today {
        return None;
    }
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

/// Purposes a patient can give or refuse consent for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentKind {
    Privacy,
    Marketing,
    DataProcessing,
}

impl ConsentKind {
    /// Consents created, refused, with every new patient.
    pub const DEFAULTS: [ConsentKind; 2] = [ConsentKind::Privacy, ConsentKind::Marketing];
}

impl FromStr for ConsentKind {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PRIVACY" => Ok(ConsentKind::Privacy),
            "MARKETING" => Ok(ConsentKind::Marketing),
            "DATA_PROCESSING" => Ok(ConsentKind::DataProcessing),
            other => Err(PatientError::InvalidInput(format!(
                "unknown consent type '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ConsentKind,
    pub given: bool,
    pub consent_date: DateTime<Utc>,
}

/// Input for registering a patient. Names are plain strings; the registry validates them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub fiscal_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
}

/// Partial update; `None` leaves a field unchanged, `Some("")` clears an optional field.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub fiscal_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
    pub occupation: Option<String>,
    pub notes: Option<String>,
}

/// Trims; blank becomes `None`.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

pub(crate) fn optional_email(value: Option<String>) -> PatientResult<Option<EmailAddress>> {
    optional_text(value)
        .map(EmailAddress::parse)
        .transpose()
        .map_err(PatientError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(1985, 8, 1), date(2026, 7, 31)), Some(40));
        assert_eq!(age_on(date(1985, 8, 1), date(2026, 8, 1)), Some(41));
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 8, 1)), None);
    }

    #[test]
    fn age_handles_leap_day_birthdays() {
        assert_eq!(age_on(date(2000, 2, 29), date(2025, 2, 28)), Some(24));
        assert_eq!(age_on(date(2000, 2, 29), date(2025, 3, 1)), Some(25));
    }

    #[test]
    fn gender_parses_short_and_long_forms() {
        assert_eq!("m".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn consent_kind_parses_kebab_and_snake_case() {
        assert_eq!(
            "data-processing".parse::<ConsentKind>().unwrap(),
            ConsentKind::DataProcessing
        );
        assert_eq!("PRIVACY".parse::<ConsentKind>().unwrap(), ConsentKind::Privacy);
    }

    #[test]
    fn optional_text_blanks_become_none() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" Roma ".into())), Some("Roma".into()));
        assert_eq!(optional_text(None), None);
    }
}
