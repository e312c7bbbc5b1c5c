use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{PatientError, PatientResult};

/// Therapy course state.
///
/// ```text
/// SCHEDULED ---> IN_PROGRESS ---> COMPLETED
///     |  \            |
///     |   \---------> |  (single-session courses complete directly)
///     v               v
/// SUSPENDED <-----> (resume to SCHEDULED or IN_PROGRESS)
///     |
///     v
/// CANCELLED   (reachable from SCHEDULED, IN_PROGRESS and SUSPENDED)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TherapyStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Suspended,
}

impl TherapyStatus {
    pub fn can_transition_to(self, next: TherapyStatus) -> bool {
        use TherapyStatus as T;
        matches!(
            (self, next),
            (T::Scheduled, T::InProgress | T::Completed | T::Suspended | T::Cancelled)
                | (T::InProgress, T::Completed | T::Suspended | T::Cancelled)
                | (T::Suspended, T::Scheduled | T::InProgress | T::Cancelled)
        )
    }

    /// Scheduled or in progress: the therapy still has work to do.
    pub fn is_open(self) -> bool {
        matches!(self, TherapyStatus::Scheduled | TherapyStatus::InProgress)
    }
}

impl fmt::Display for TherapyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TherapyStatus::Scheduled => "SCHEDULED",
            TherapyStatus::InProgress => "IN_PROGRESS",
            TherapyStatus::Completed => "COMPLETED",
            TherapyStatus::Cancelled => "CANCELLED",
            TherapyStatus::Suspended => "SUSPENDED",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TherapyCategory {
    Instrumental,
    Manual,
    Rehabilitation,
}

impl fmt::Display for TherapyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TherapyCategory::Instrumental => "INSTRUMENTAL",
            TherapyCategory::Manual => "MANUAL",
            TherapyCategory::Rehabilitation => "REHABILITATION",
        })
    }
}

/// Catalogue entry describing a kind of therapy the clinic offers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TherapyType {
    pub code: &'static str,
    pub name: &'static str,
    pub category: TherapyCategory,
    pub default_duration_minutes: u32,
}

pub const THERAPY_TYPES: &[TherapyType] = &[
    TherapyType { code: "TECAR", name: "Tecarterapia", category: TherapyCategory::Instrumental, default_duration_minutes: 30 },
    TherapyType { code: "LASER", name: "Laserterapia ad alta potenza", category: TherapyCategory::Instrumental, default_duration_minutes: 20 },
    TherapyType { code: "ULTRASOUND", name: "Ultrasuonoterapia", category: TherapyCategory::Instrumental, default_duration_minutes: 15 },
    TherapyType { code: "TENS", name: "Elettroterapia antalgica (TENS)", category: TherapyCategory::Instrumental, default_duration_minutes: 30 },
    TherapyType { code: "SHOCKWAVE", name: "Onde d'urto focali", category: TherapyCategory::Instrumental, default_duration_minutes: 15 },
    TherapyType { code: "MAGNETO", name: "Magnetoterapia", category: TherapyCategory::Instrumental, default_duration_minutes: 45 },
    TherapyType { code: "MASSAGE", name: "Massoterapia", category: TherapyCategory::Manual, default_duration_minutes: 30 },
    TherapyType { code: "MANUAL_THERAPY", name: "Terapia manuale", category: TherapyCategory::Manual, default_duration_minutes: 45 },
    TherapyType { code: "LYMPH_DRAINAGE", name: "Linfodrenaggio manuale", category: TherapyCategory::Manual, default_duration_minutes: 60 },
    TherapyType { code: "KINESIO", name: "Kinesiterapia", category: TherapyCategory::Rehabilitation, default_duration_minutes: 45 },
    TherapyType { code: "POSTURAL", name: "Rieducazione posturale globale", category: TherapyCategory::Rehabilitation, default_duration_minutes: 60 },
    TherapyType { code: "PROPRIOCEPTIVE", name: "Rieducazione propriocettiva", category: TherapyCategory::Rehabilitation, default_duration_minutes: 45 },
    TherapyType { code: "FUNCTIONAL_REHAB", name: "Riabilitazione funzionale", category: TherapyCategory::Rehabilitation, default_duration_minutes: 60 },
];

/// Looks up a therapy type by code, case-insensitively.
pub fn therapy_type(code: &str) -> PatientResult<&'static TherapyType> {
    let code = code.trim();
    THERAPY_TYPES
        .iter()
        .find(|t| t.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| PatientError::TherapyTypeNotFound(code.to_owned()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pressure {
    Light,
    Medium,
    Deep,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Exercise {
    pub name: String,
    pub sets: u32,
    pub repetitions: u32,
}

/// Treatment parameters, with a fixed key set per therapy category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum TherapyParameters {
    Instrumental {
        #[serde(default)]
        intensity_percent: Option<u8>,
        #[serde(default)]
        frequency_hz: Option<f64>,
        #[serde(default)]
        power_watts: Option<f64>,
        #[serde(default)]
        application_minutes: Option<u32>,
        #[serde(default)]
        mode: Option<String>,
    },
    Manual {
        #[serde(default)]
        technique: Option<String>,
        #[serde(default)]
        pressure: Option<Pressure>,
        #[serde(default)]
        body_area: Option<String>,
    },
    Rehabilitation {
        #[serde(default)]
        exercises: Vec<Exercise>,
        #[serde(default)]
        load_kg: Option<f64>,
    },
}

impl TherapyParameters {
    pub fn category(&self) -> TherapyCategory {
        match self {
            TherapyParameters::Instrumental { .. } => TherapyCategory::Instrumental,
            TherapyParameters::Manual { .. } => TherapyCategory::Manual,
            TherapyParameters::Rehabilitation { .. } => TherapyCategory::Rehabilitation,
        }
    }

    /// Checks value ranges and that the parameters fit `therapy_type`.
    pub fn validate_for(&self, therapy_type: &TherapyType) -> PatientResult<()> {
        if self.category() != therapy_type.category {
            return Err(PatientError::ParameterCategoryMismatch {
                therapy_type: therapy_type.code.to_owned(),
                expected: therapy_type.category.to_string(),
                actual: self.category().to_string(),
            });
        }

        match self {
            TherapyParameters::Instrumental {
                intensity_percent,
                frequency_hz,
                power_watts,
                ..
            } => {
                if intensity_percent.is_some_and(|p| p > 100) {
                    return Err(PatientError::InvalidInput(
                        "intensity must be a percentage (0-100)".into(),
                    ));
                }
                if frequency_hz.is_some_and(|f| !(f > 0.0)) || power_watts.is_some_and(|w| !(w > 0.0)) {
                    return Err(PatientError::InvalidInput(
                        "frequency and power must be positive".into(),
                    ));
                }
            }
            TherapyParameters::Manual { .. } => {}
            TherapyParameters::Rehabilitation { exercises, load_kg } => {
                if let Some(bad) = exercises
                    .iter()
                    .find(|e| e.name.trim().is_empty() || e.sets == 0 || e.repetitions == 0)
                {
                    return Err(PatientError::InvalidInput(format!(
                        "exercise '{}' needs a name and at least one set and repetition",
                        bad.name
                    )));
                }
                if load_kg.is_some_and(|l| l < 0.0) {
                    return Err(PatientError::InvalidInput("load cannot be negative".into()));
                }
            }
        }
        Ok(())
    }
}

/// A prescribed course of sessions of one therapy type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Therapy {
    pub id: Uuid,
    pub record_id: Uuid,
    pub therapy_type: String,
    pub prescribed_sessions: u32,
    pub completed_sessions: u32,
    pub status: TherapyStatus,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parameters: Option<TherapyParameters>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Therapy {
    /// Status as reported to readers: a course whose sessions are all done is COMPLETED
    /// whatever the stored status says, and one with no completed sessions that is not
    /// cancelled or suspended is SCHEDULED.
    pub fn effective_status(&self) -> TherapyStatus {
        match self.status {
            TherapyStatus::Cancelled | TherapyStatus::Suspended => self.status,
            _ if self.prescribed_sessions > 0
                && self.completed_sessions >= self.prescribed_sessions =>
            {
                TherapyStatus::Completed
            }
            _ if self.completed_sessions == 0 => TherapyStatus::Scheduled,
            _ => TherapyStatus::InProgress,
        }
    }

    pub fn remaining_sessions(&self) -> u32 {
        self.prescribed_sessions.saturating_sub(self.completed_sessions)
    }

    pub(crate) fn transition(&mut self, next: TherapyStatus, now: DateTime<Utc>) -> PatientResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PatientError::IllegalTransition {
                entity: "therapy",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Counts one newly completed session and moves the course forward.
    pub(crate) fn register_completion(&mut self, now: DateTime<Utc>) -> PatientResult<()> {
        if !self.status.is_open() {
            return Err(PatientError::IllegalTransition {
                entity: "therapy",
                from: self.status.to_string(),
                to: TherapyStatus::InProgress.to_string(),
            });
        }
        if self.completed_sessions >= self.prescribed_sessions {
            return Err(PatientError::SessionLimitReached {
                therapy_id: self.id,
                prescribed: self.prescribed_sessions,
            });
        }

        self.completed_sessions += 1;
        let next = if self.completed_sessions == self.prescribed_sessions {
            TherapyStatus::Completed
        } else {
            TherapyStatus::InProgress
        };
        if next != self.status {
            self.transition(next, now)?;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Input for [`crate::ClinicalRecordService::add_therapy`].
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTherapy {
    pub therapy_type: String,
    pub prescribed_sessions: u32,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub parameters: Option<TherapyParameters>,
}
