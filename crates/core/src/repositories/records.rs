//! Clinical record lifecycle.
//!
//! A record opens ACTIVE, collects therapies and narrative edits, and toggles between
//! ACTIVE and CLOSED. A patient never has two ACTIVE records; the dataset enforces that
//! on every insert and update, so `create` and `reopen` both surface
//! [`PatientError::ActiveRecordExists`] without checking it themselves.

use chrono::{DateTime, NaiveDate, Utc};
use fisio_ids::RecordNumber;
use fisio_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::RECORD_NUMBER_ATTEMPTS;
use crate::context::CoreContext;
use crate::model::patient::optional_text;
use crate::model::{
    therapy_type, ClinicalRecord, NewRecord, NewTherapy, RecordOverrides, RecordSection,
    RecordStatus, Therapy, TherapyStatus,
};
use crate::paging::{PageRequest, Paginated, SortOrder};
use crate::statistics::{self, RecordStatistics};
use crate::store::{Dataset, Store};
use crate::templates::{self, RecordTemplate, TEMPLATES};
use crate::timeline::{self, TimelineEvent};
use crate::{PatientError, PatientResult};

/// Filters for [`ClinicalRecordService::search`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSearch {
    pub patient_id: Option<Uuid>,
    pub status: Option<RecordStatus>,
    /// Case-insensitive substring over record number, diagnosis and patient name.
    pub query: Option<String>,
    /// Inclusive bounds on the opening date.
    pub opened_from: Option<NaiveDate>,
    pub opened_to: Option<NaiveDate>,
    /// Newest first unless set.
    pub order: Option<SortOrder>,
    #[serde(flatten)]
    pub page: PageRequest,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    #[serde(flatten)]
    pub record: ClinicalRecord,
    pub patient_name: String,
    pub therapy_count: usize,
}

fn build_record(
    patient_id: Uuid,
    diagnosis: NonEmptyText,
    input: &NewRecord,
    record_number: String,
    now: DateTime<Utc>,
) -> ClinicalRecord {
    ClinicalRecord {
        id: Uuid::new_v4(),
        patient_id,
        record_number,
        diagnosis,
        anamnesis: optional_text(input.anamnesis.clone()),
        objective_examination: optional_text(input.objective_examination.clone()),
        clinical_examination: optional_text(input.clinical_examination.clone()),
        treatment_plan: optional_text(input.treatment_plan.clone()),
        notes: optional_text(input.notes.clone()),
        status: RecordStatus::Active,
        created_at: now,
        updated_at: now,
        closed_at: None,
    }
}

/// Template defaults with any supplied override taking precedence.
fn merge_template(template: &RecordTemplate, overrides: RecordOverrides) -> NewRecord {
    NewRecord {
        diagnosis: overrides
            .diagnosis
            .unwrap_or_else(|| template.diagnosis.to_owned()),
        anamnesis: overrides.anamnesis,
        objective_examination: overrides
            .objective_examination
            .or_else(|| Some(template.objective_examination.to_owned())),
        clinical_examination: overrides.clinical_examination,
        treatment_plan: overrides
            .treatment_plan
            .or_else(|| Some(template.treatment_plan.to_owned())),
        notes: overrides.notes,
        record_number: overrides.record_number,
    }
}

/// Service for opening, editing, closing and reopening clinical records.
#[derive(Clone)]
pub struct ClinicalRecordService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> ClinicalRecordService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    /// Opens a new ACTIVE record for a patient.
    ///
    /// When `input.record_number` is absent a number is generated; a generated number that
    /// is already taken is replaced and retried up to [`RECORD_NUMBER_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// - [`PatientError::InvalidInput`] if the diagnosis is blank;
    /// - [`PatientError::Id`] if a supplied record number is malformed;
    /// - [`PatientError::PatientNotFound`] if the patient does not exist or is deleted;
    /// - [`PatientError::ActiveRecordExists`] if the patient already has an ACTIVE record;
    /// - [`PatientError::RecordNumberTaken`] if a supplied number is in use, or every
    ///   generated attempt collided.
    pub fn create(&self, patient_id: Uuid, input: NewRecord) -> PatientResult<ClinicalRecord> {
        let diagnosis = NonEmptyText::new(&input.diagnosis)
            .map_err(|_| PatientError::InvalidInput("diagnosis is required".into()))?;
        let now = self.ctx.now();

        if let Some(number) = optional_text(input.record_number.clone()) {
            let number = number.parse::<RecordNumber>()?.to_string();
            let record = build_record(patient_id, diagnosis, &input, number, now);
            self.insert(record.clone())?;
            tracing::info!(record_id = %record.id, record_number = %record.record_number, "clinical record opened");
            return Ok(record);
        }

        let mut last_number = String::new();
        for attempt in 1..=RECORD_NUMBER_ATTEMPTS {
            let number = self.ctx.record_numbers.next_record_number(now);
            let record = build_record(patient_id, diagnosis.clone(), &input, number, now);
            match self.insert(record.clone()) {
                Ok(()) => {
                    tracing::info!(record_id = %record.id, record_number = %record.record_number, "clinical record opened");
                    return Ok(record);
                }
                Err(PatientError::RecordNumberTaken(number)) => {
                    tracing::warn!(attempt, record_number = %number, "record number collision, retrying");
                    last_number = number;
                }
                Err(e) => return Err(e),
            }
        }

        Err(PatientError::RecordNumberTaken(last_number))
    }

    fn insert(&self, record: ClinicalRecord) -> PatientResult<()> {
        self.ctx.store.transaction(|data| data.insert_record(record))
    }

    /// Opens a record pre-filled from one of the built-in templates.
    pub fn create_from_template(
        &self,
        patient_id: Uuid,
        template_key: &str,
        overrides: RecordOverrides,
    ) -> PatientResult<ClinicalRecord> {
        let template = templates::template(template_key)?;
        self.create(patient_id, merge_template(template, overrides))
    }

    pub fn templates(&self) -> &'static [RecordTemplate] {
        TEMPLATES
    }

    pub fn get(&self, id: Uuid) -> PatientResult<ClinicalRecord> {
        self.ctx.store.read(|data| data.record(id).cloned())?
    }

    /// A record's therapies in prescription order.
    pub fn therapies(&self, record_id: Uuid) -> PatientResult<Vec<Therapy>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.record(record_id)?;
            Ok(data.therapies_of(record_id).into_iter().cloned().collect())
        })?
    }

    /// Replaces one narrative section. Allowed whatever the record's status.
    pub fn update_section(
        &self,
        id: Uuid,
        section: RecordSection,
        content: &str,
    ) -> PatientResult<ClinicalRecord> {
        let now = self.ctx.now();
        let record = self.ctx.store.transaction(|data| {
            let mut record = data.record(id)?.clone();
            record.set_section(section, content)?;
            record.updated_at = now;
            data.update_record(record.clone())?;
            Ok(record)
        })?;
        tracing::info!(record_id = %id, section = ?section, "record section updated");
        Ok(record)
    }

    /// Prescribes a new therapy course on an ACTIVE record.
    ///
    /// # Errors
    ///
    /// - [`PatientError::TherapyTypeNotFound`] for an unknown therapy type code;
    /// - [`PatientError::InvalidInput`] if no sessions are prescribed;
    /// - [`PatientError::ParameterCategoryMismatch`] if the parameters belong to another
    ///   therapy category;
    /// - [`PatientError::RecordClosed`] if the record is CLOSED.
    pub fn add_therapy(&self, record_id: Uuid, input: NewTherapy) -> PatientResult<Therapy> {
        let kind = therapy_type(&input.therapy_type)?;
        if input.prescribed_sessions == 0 {
            return Err(PatientError::InvalidInput(
                "at least one session must be prescribed".into(),
            ));
        }
        if let Some(parameters) = &input.parameters {
            parameters.validate_for(kind)?;
        }

        let now = self.ctx.now();
        let therapy = Therapy {
            id: Uuid::new_v4(),
            record_id,
            therapy_type: kind.code.to_owned(),
            prescribed_sessions: input.prescribed_sessions,
            completed_sessions: 0,
            status: TherapyStatus::Scheduled,
            frequency: optional_text(input.frequency),
            district: optional_text(input.district),
            start_date: input.start_date,
            notes: optional_text(input.notes),
            parameters: input.parameters,
            created_at: now,
            updated_at: now,
        };

        let stored = therapy.clone();
        self.ctx.store.transaction(|data| {
            if !data.record(record_id)?.is_active() {
                return Err(PatientError::RecordClosed(record_id));
            }
            data.insert_therapy(stored)
        })?;

        tracing::info!(record_id = %record_id, therapy_id = %therapy.id, therapy_type = kind.code, "therapy added");
        Ok(therapy)
    }

    /// ACTIVE -> CLOSED, refused while any therapy is still SCHEDULED or IN_PROGRESS.
    pub fn close(&self, id: Uuid, closure_notes: Option<&str>) -> PatientResult<ClinicalRecord> {
        let now = self.ctx.now();
        let result = self.ctx.store.transaction(|data| {
            let mut record = data.record(id)?.clone();
            record.close(now, closure_notes)?;

            let open = data
                .therapies_of(id)
                .iter()
                .filter(|t| t.status.is_open())
                .count();
            if open > 0 {
                return Err(PatientError::ActiveTherapiesBlockClose {
                    record_id: id,
                    count: open,
                });
            }

            data.update_record(record.clone())?;
            Ok(record)
        });

        match &result {
            Ok(_) => tracing::info!(record_id = %id, "clinical record closed"),
            Err(e) => tracing::warn!(record_id = %id, error = %e, "close refused"),
        }
        result
    }

    /// CLOSED -> ACTIVE with the reason logged in the notes.
    pub fn reopen(&self, id: Uuid, reason: &str) -> PatientResult<ClinicalRecord> {
        if reason.trim().is_empty() {
            return Err(PatientError::InvalidInput("a reason is required to reopen".into()));
        }
        let now = self.ctx.now();
        let result = self.ctx.store.transaction(|data| {
            let mut record = data.record(id)?.clone();
            record.reopen(now, reason)?;
            data.update_record(record.clone())?;
            Ok(record)
        });

        match &result {
            Ok(_) => tracing::info!(record_id = %id, "clinical record reopened"),
            Err(e) => tracing::warn!(record_id = %id, error = %e, "reopen refused"),
        }
        result
    }

    /// Lists records of live patients, newest first by default.
    pub fn search(&self, search: RecordSearch) -> PatientResult<Paginated<RecordSummary>> {
        let needle = optional_text(search.query.clone()).map(|q| q.to_lowercase());
        let order = search.order.unwrap_or(SortOrder::Desc);

        let mut rows = self.ctx.store.read(|data| {
            data.records()
                .filter(|r| search.patient_id.map_or(true, |id| r.patient_id == id))
                .filter(|r| search.status.map_or(true, |s| r.status == s))
                .filter(|r| {
                    let opened = r.created_at.date_naive();
                    search.opened_from.map_or(true, |from| opened >= from)
                        && search.opened_to.map_or(true, |to| opened <= to)
                })
                .filter_map(|r| summarize(data, r))
                .filter(|row| {
                    needle.as_deref().map_or(true, |needle| {
                        [
                            row.record.record_number.as_str(),
                            row.record.diagnosis.as_str(),
                            row.patient_name.as_str(),
                        ]
                        .iter()
                        .any(|field| field.to_lowercase().contains(needle))
                    })
                })
                .collect::<Vec<_>>()
        })?;

        rows.sort_by(|a, b| {
            order.apply(
                a.record
                    .created_at
                    .cmp(&b.record.created_at)
                    .then_with(|| a.record.record_number.cmp(&b.record.record_number)),
            )
        });
        Paginated::from_sorted(rows, search.page, &self.ctx.cfg)
    }

    /// Every event of the record, most recent first.
    pub fn timeline(&self, id: Uuid) -> PatientResult<Vec<TimelineEvent>> {
        self.ctx.store.read(|data| timeline::build_timeline(data, id))?
    }

    pub fn statistics(&self, id: Uuid) -> PatientResult<RecordStatistics> {
        let now = self.ctx.now();
        self.ctx
            .store
            .read(|data| statistics::record_statistics(data, id, now))?
    }
}

/// `None` for records whose patient has been deleted.
fn summarize(data: &Dataset, record: &ClinicalRecord) -> Option<RecordSummary> {
    let patient = data.patient(record.patient_id).ok()?;
    Some(RecordSummary {
        record: record.clone(),
        patient_name: patient.full_name(),
        therapy_count: data.therapies_of(record.id).len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{PatientRegistry, TherapyService};
    use crate::testing::{context, now, patient_input, record_input, therapy_input, ScriptedNumbers};
    use crate::{ErrorKind, MemoryStore};
    use std::sync::Arc;

    fn setup() -> (ClinicalRecordService<MemoryStore>, PatientRegistry<MemoryStore>, Uuid) {
        let ctx = context();
        let registry = PatientRegistry::new(ctx.clone());
        let patient = registry.create(patient_input("Mario", "Rossi")).unwrap();
        (ClinicalRecordService::new(ctx), registry, patient.id)
    }

    #[test]
    fn create_generates_record_number() {
        let (records, _, patient_id) = setup();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();
        assert_eq!(record.record_number, "CC-20261018-00000001");
        assert_eq!(record.status, RecordStatus::Active);
        assert_eq!(record.created_at, now());
        assert!(record.closed_at.is_none());
    }

    #[test]
    fn create_requires_existing_patient_and_diagnosis() {
        let (records, _, patient_id) = setup();
        assert!(matches!(
            records.create(Uuid::new_v4(), record_input("Lombalgia")),
            Err(PatientError::PatientNotFound(_))
        ));
        assert_eq!(
            records.create(patient_id, record_input("  ")).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn second_active_record_is_a_conflict() {
        let (records, _, patient_id) = setup();
        records.create(patient_id, record_input("Lombalgia")).unwrap();
        let err = records
            .create(patient_id, record_input("Cervicalgia"))
            .unwrap_err();
        assert!(matches!(err, PatientError::ActiveRecordExists { .. }));
    }

    #[test]
    fn supplied_duplicate_number_is_a_conflict() {
        let (records, registry, patient_id) = setup();
        let other = registry.create(patient_input("Luigi", "Verdi")).unwrap();
        let mut input = record_input("Lombalgia");
        input.record_number = Some(" CC-20250301-0000ABCD ".into());
        let record = records.create(patient_id, input.clone()).unwrap();
        assert_eq!(record.record_number, "CC-20250301-0000ABCD");

        let err = records.create(other.id, input).unwrap_err();
        assert!(matches!(err, PatientError::RecordNumberTaken(ref n) if n == "CC-20250301-0000ABCD"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn supplied_malformed_number_is_rejected() {
        let (records, _, patient_id) = setup();
        let mut input = record_input("Lombalgia");
        input.record_number = Some("CC-MANUAL-1".into());

        let err = records.create(patient_id, input).unwrap_err();
        assert!(matches!(err, PatientError::Id(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(records.search(RecordSearch::default()).unwrap().pagination.total, 0);
    }

    #[test]
    fn generated_collision_is_retried() {
        let ctx = context().with_record_numbers(Arc::new(ScriptedNumbers::new(&[
            "CC-20261018-AAAAAAAA",
            "CC-20261018-AAAAAAAA",
            "CC-20261018-BBBBBBBB",
        ])));
        let registry = PatientRegistry::new(ctx.clone());
        let records = ClinicalRecordService::new(ctx);
        let a = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let b = registry.create(patient_input("Luigi", "Verdi")).unwrap();

        records.create(a.id, record_input("Lombalgia")).unwrap();
        let second = records.create(b.id, record_input("Cervicalgia")).unwrap();
        assert_eq!(second.record_number, "CC-20261018-BBBBBBBB");
    }

    #[test]
    fn generation_gives_up_after_bounded_attempts() {
        let ctx = context().with_record_numbers(Arc::new(ScriptedNumbers::new(&["CC-20261018-AAAAAAAA"])));
        let registry = PatientRegistry::new(ctx.clone());
        let records = ClinicalRecordService::new(ctx);
        let a = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let b = registry.create(patient_input("Luigi", "Verdi")).unwrap();

        records.create(a.id, record_input("Lombalgia")).unwrap();
        let err = records.create(b.id, record_input("Cervicalgia")).unwrap_err();
        assert!(matches!(err, PatientError::RecordNumberTaken(_)));
        assert_eq!(records.search(RecordSearch::default()).unwrap().pagination.total, 1);
    }

    #[test]
    fn template_fills_sections_and_overrides_win() {
        let (records, _, patient_id) = setup();
        let record = records
            .create_from_template(
                patient_id,
                "distorsione_caviglia",
                RecordOverrides {
                    treatment_plan: Some("Solo propriocezione".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let template = templates::template("distorsione_caviglia").unwrap();
        assert_eq!(record.diagnosis.as_str(), template.diagnosis);
        assert_eq!(
            record.objective_examination.as_deref(),
            Some(template.objective_examination)
        );
        assert_eq!(record.treatment_plan.as_deref(), Some("Solo propriocezione"));

        assert!(matches!(
            records.create_from_template(patient_id, "sconosciuto", RecordOverrides::default()),
            Err(PatientError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn close_is_blocked_by_open_therapies() {
        let ctx = context();
        let registry = PatientRegistry::new(ctx.clone());
        let records = ClinicalRecordService::new(ctx.clone());
        let therapies = TherapyService::new(ctx);
        let patient = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let record = records.create(patient.id, record_input("Lombalgia")).unwrap();
        let therapy = records.add_therapy(record.id, therapy_input("TECAR", 5)).unwrap();

        let err = records.close(record.id, None).unwrap_err();
        assert!(matches!(
            err,
            PatientError::ActiveTherapiesBlockClose { count: 1, .. }
        ));
        assert!(records.get(record.id).unwrap().is_active());

        therapies.cancel(therapy.id, "Paziente trasferito").unwrap();
        let closed = records.close(record.id, Some("Fine ciclo")).unwrap();
        assert_eq!(closed.status, RecordStatus::Closed);
        assert_eq!(closed.closed_at, Some(now()));
        assert_eq!(closed.notes.as_deref(), Some("Closed on 2026-10-18: Fine ciclo"));
    }

    #[test]
    fn reopen_appends_reason_and_clears_closed_at() {
        let (records, _, patient_id) = setup();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();
        records.close(record.id, None).unwrap();

        let reopened = records.reopen(record.id, "Recidiva").unwrap();
        assert!(reopened.is_active());
        assert!(reopened.closed_at.is_none());
        assert_eq!(reopened.notes.as_deref(), Some("Reopened on 2026-10-18: Recidiva"));

        let err = records.reopen(record.id, "di nuovo").unwrap_err();
        assert!(matches!(err, PatientError::IllegalTransition { .. }));
    }

    #[test]
    fn reopen_refuses_second_active_record() {
        let (records, _, patient_id) = setup();
        let first = records.create(patient_id, record_input("Lombalgia")).unwrap();
        records.close(first.id, None).unwrap();
        records.create(patient_id, record_input("Cervicalgia")).unwrap();

        let err = records.reopen(first.id, "Recidiva").unwrap_err();
        assert!(matches!(err, PatientError::ActiveRecordExists { .. }));
        assert_eq!(records.get(first.id).unwrap().status, RecordStatus::Closed);
    }

    #[test]
    fn reopen_is_refused_once_the_patient_is_deleted() {
        let (records, registry, patient_id) = setup();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();
        records.close(record.id, None).unwrap();
        registry.delete(patient_id).unwrap();

        let err = records.reopen(record.id, "Recidiva").unwrap_err();
        assert!(matches!(err, PatientError::PatientNotFound(id) if id == patient_id));
        let stored = records.get(record.id).unwrap();
        assert_eq!(stored.status, RecordStatus::Closed);
        assert!(stored.notes.is_none());
        assert!(matches!(
            records.add_therapy(record.id, therapy_input("TENS", 3)),
            Err(PatientError::RecordClosed(_))
        ));
    }

    #[test]
    fn closed_record_rejects_new_therapies_but_accepts_edits() {
        let (records, _, patient_id) = setup();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();
        records.close(record.id, None).unwrap();

        assert!(matches!(
            records.add_therapy(record.id, therapy_input("MASSAGE", 3)),
            Err(PatientError::RecordClosed(_))
        ));
        let edited = records
            .update_section(record.id, RecordSection::Anamnesis, "Dolore da 3 settimane")
            .unwrap();
        assert_eq!(edited.anamnesis.as_deref(), Some("Dolore da 3 settimane"));
        assert_eq!(edited.status, RecordStatus::Closed);
    }

    #[test]
    fn add_therapy_validates_input() {
        let (records, _, patient_id) = setup();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();

        assert!(matches!(
            records.add_therapy(record.id, therapy_input("AGOPUNTURA", 3)),
            Err(PatientError::TherapyTypeNotFound(_))
        ));
        assert_eq!(
            records
                .add_therapy(record.id, therapy_input("TECAR", 0))
                .unwrap_err()
                .kind(),
            ErrorKind::Validation
        );

        let therapy = records.add_therapy(record.id, therapy_input("tecar", 10)).unwrap();
        assert_eq!(therapy.therapy_type, "TECAR");
        assert_eq!(therapy.status, TherapyStatus::Scheduled);
        assert_eq!(therapy.completed_sessions, 0);
    }

    #[test]
    fn search_matches_patient_name_and_annotates_rows() {
        let (records, registry, patient_id) = setup();
        let other = registry.create(patient_input("Giulia", "Bianchi")).unwrap();
        let record = records.create(patient_id, record_input("Lombalgia")).unwrap();
        records.add_therapy(record.id, therapy_input("TECAR", 5)).unwrap();
        records.create(other.id, record_input("Epicondilite")).unwrap();

        let page = records
            .search(RecordSearch {
                query: Some("rossi".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].patient_name, "Mario Rossi");
        assert_eq!(page.data[0].therapy_count, 1);

        let active = records
            .search(RecordSearch {
                status: Some(RecordStatus::Active),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(active.pagination.total, 2);
    }
}
