use chrono::{DateTime, Utc};
use fisio_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::NOTE_DATE_FORMAT;
use crate::{PatientError, PatientResult};

/// Lifecycle state of a clinical record.
///
/// ```text
/// ACTIVE --close--> CLOSED --reopen--> ACTIVE
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Active,
    Closed,
}

impl RecordStatus {
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Active, RecordStatus::Closed) | (RecordStatus::Closed, RecordStatus::Active)
        )
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordStatus::Active => "ACTIVE",
            RecordStatus::Closed => "CLOSED",
        })
    }
}

impl FromStr for RecordStatus {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(RecordStatus::Active),
            "CLOSED" => Ok(RecordStatus::Closed),
            other => Err(PatientError::InvalidInput(format!(
                "unknown record status '{other}'"
            ))),
        }
    }
}

/// A clinical record ("cartella clinica"): one care episode of one patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub record_number: String,
    pub diagnosis: NonEmptyText,
    #[serde(default)]
    pub anamnesis: Option<String>,
    #[serde(default)]
    pub objective_examination: Option<String>,
    #[serde(default)]
    pub clinical_examination: Option<String>,
    #[serde(default)]
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ClinicalRecord {
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    fn transition(&mut self, next: RecordStatus) -> PatientResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(PatientError::IllegalTransition {
                entity: "clinical record",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// ACTIVE -> CLOSED. Therapy preconditions are checked by the caller.
    pub(crate) fn close(&mut self, now: DateTime<Utc>, closure_notes: Option<&str>) -> PatientResult<()> {
        self.transition(RecordStatus::Closed)?;
        self.closed_at = Some(now);
        self.updated_at = now;
        if let Some(text) = closure_notes.map(str::trim).filter(|t| !t.is_empty()) {
            append_note(
                &mut self.notes,
                &format!("Closed on {}: {}", now.format(NOTE_DATE_FORMAT), text),
            );
        }
        Ok(())
    }

    /// CLOSED -> ACTIVE, leaving an audit line in the notes.
    pub(crate) fn reopen(&mut self, now: DateTime<Utc>, reason: &str) -> PatientResult<()> {
        self.transition(RecordStatus::Active)?;
        self.closed_at = None;
        self.updated_at = now;
        append_note(
            &mut self.notes,
            &format!("Reopened on {}: {}", now.format(NOTE_DATE_FORMAT), reason.trim()),
        );
        Ok(())
    }

    /// Returns the current content of `section`.
    pub fn section(&self, section: RecordSection) -> Option<&str> {
        match section {
            RecordSection::Diagnosis => Some(self.diagnosis.as_str()),
            RecordSection::Anamnesis => self.anamnesis.as_deref(),
            RecordSection::ObjectiveExamination => self.objective_examination.as_deref(),
            RecordSection::ClinicalExamination => self.clinical_examination.as_deref(),
            RecordSection::TreatmentPlan => self.treatment_plan.as_deref(),
            RecordSection::Notes => self.notes.as_deref(),
        }
    }

    /// Replaces one narrative section. Blank content clears an optional section; the
    /// diagnosis cannot be cleared.
    pub(crate) fn set_section(&mut self, section: RecordSection, content: &str) -> PatientResult<()> {
        let text = Some(content.trim().to_owned()).filter(|t| !t.is_empty());
        match section {
            RecordSection::Diagnosis => self.diagnosis = NonEmptyText::new(content)?,
            RecordSection::Anamnesis => self.anamnesis = text,
            RecordSection::ObjectiveExamination => self.objective_examination = text,
            RecordSection::ClinicalExamination => self.clinical_examination = text,
            RecordSection::TreatmentPlan => self.treatment_plan = text,
            RecordSection::Notes => self.notes = text,
        }
        Ok(())
    }
}

/// Appends `line` to a free-text notes field, one entry per line.
pub(crate) fn append_note(notes: &mut Option<String>, line: &str) {
    match notes {
        Some(existing) if !existing.trim().is_empty() => {
            existing.push('\n');
            existing.push_str(line);
        }
        _ => *notes = Some(line.to_owned()),
    }
}

/// The narrative sections of a record that can be edited independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSection {
    Diagnosis,
    Anamnesis,
    #[serde(alias = "objective")]
    ObjectiveExamination,
    ClinicalExamination,
    TreatmentPlan,
    Notes,
}

impl FromStr for RecordSection {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "diagnosis" => Ok(RecordSection::Diagnosis),
            "anamnesis" => Ok(RecordSection::Anamnesis),
            "objective" | "objectiveexamination" => Ok(RecordSection::ObjectiveExamination),
            "clinicalexamination" => Ok(RecordSection::ClinicalExamination),
            "treatmentplan" => Ok(RecordSection::TreatmentPlan),
            "notes" => Ok(RecordSection::Notes),
            _ => Err(PatientError::InvalidInput(format!(
                "unknown record section '{}'",
                s.trim()
            ))),
        }
    }
}

/// Input for opening a clinical record.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub diagnosis: String,
    pub anamnesis: Option<String>,
    pub objective_examination: Option<String>,
    pub clinical_examination: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    /// Generated when absent.
    pub record_number: Option<String>,
}

/// Fields that replace a template's defaults when instantiating it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOverrides {
    pub diagnosis: Option<String>,
    pub anamnesis: Option<String>,
    pub objective_examination: Option<String>,
    pub clinical_examination: Option<String>,
    pub treatment_plan: Option<String>,
    pub notes: Option<String>,
    pub record_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(now: DateTime<Utc>) -> ClinicalRecord {
        ClinicalRecord {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            record_number: "CC-20261018-00000001".into(),
            diagnosis: NonEmptyText::new("Lombalgia acuta").unwrap(),
            anamnesis: None,
            objective_examination: None,
            clinical_examination: None,
            treatment_plan: None,
            notes: Some("Prima visita".into()),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn transition_table_only_allows_toggling() {
        assert!(RecordStatus::Active.can_transition_to(RecordStatus::Closed));
        assert!(RecordStatus::Closed.can_transition_to(RecordStatus::Active));
        assert!(!RecordStatus::Active.can_transition_to(RecordStatus::Active));
        assert!(!RecordStatus::Closed.can_transition_to(RecordStatus::Closed));
    }

    #[test]
    fn close_then_reopen_appends_audit_lines() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
        let mut record = sample(now);

        record.close(now, Some("Obiettivi raggiunti")).unwrap();
        assert_eq!(record.status, RecordStatus::Closed);
        assert_eq!(record.closed_at, Some(now));

        record.reopen(now, "Recidiva").unwrap();
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.closed_at, None);
        assert_eq!(
            record.notes.as_deref(),
            Some("Prima visita\nClosed on 2026-10-18: Obiettivi raggiunti\nReopened on 2026-10-18: Recidiva")
        );
    }

    #[test]
    fn closing_twice_is_illegal() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
        let mut record = sample(now);
        record.close(now, None).unwrap();
        let err = record.close(now, None).unwrap_err();
        assert!(matches!(err, PatientError::IllegalTransition { .. }));
    }

    #[test]
    fn diagnosis_cannot_be_blanked() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap();
        let mut record = sample(now);
        assert!(record.set_section(RecordSection::Diagnosis, "  ").is_err());
        record.set_section(RecordSection::Notes, " ").unwrap();
        assert_eq!(record.notes, None);
    }

    #[test]
    fn section_names_parse_loosely() {
        assert_eq!(
            "treatment_plan".parse::<RecordSection>().unwrap(),
            RecordSection::TreatmentPlan
        );
        assert_eq!(
            "objective".parse::<RecordSection>().unwrap(),
            RecordSection::ObjectiveExamination
        );
        assert_eq!(
            "clinicalExamination".parse::<RecordSection>().unwrap(),
            RecordSection::ClinicalExamination
        );
        assert!("status".parse::<RecordSection>().is_err());
    }
}
