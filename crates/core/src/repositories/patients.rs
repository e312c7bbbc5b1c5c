//! Patient registry.
//!
//! Registration, partial updates, soft deletion, consents and the advanced search.
//! Every check-and-write runs inside one store transaction, so uniqueness of fiscal
//! codes and the "no active record" rule for deletion hold under concurrent use.

use chrono::{Months, NaiveDate};
use fisio_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::context::CoreContext;
use crate::fiscal_code;
use crate::model::patient::{optional_email, optional_text};
use crate::model::{Consent, ConsentKind, Gender, NewPatient, Patient, PatientUpdate};
use crate::paging::{PageRequest, Paginated, SortOrder};
use crate::statistics::{self, PatientStatistics};
use crate::store::Store;
use crate::{PatientError, PatientResult};

/// Oldest age accepted in search filters.
const MAX_SEARCH_AGE: u32 = 150;

/// Columns the patient search can sort by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatientSortField {
    FirstName,
    #[default]
    LastName,
    FiscalCode,
    BirthDate,
    Gender,
    Email,
    Phone,
    City,
    CreatedAt,
    UpdatedAt,
}

impl PatientSortField {
    fn compare(self, a: &Patient, b: &Patient) -> Ordering {
        let lower = |s: &str| s.to_lowercase();
        match self {
            PatientSortField::FirstName => lower(a.first_name.as_str()).cmp(&lower(b.first_name.as_str())),
            PatientSortField::LastName => lower(a.last_name.as_str())
                .cmp(&lower(b.last_name.as_str()))
                .then_with(|| lower(a.first_name.as_str()).cmp(&lower(b.first_name.as_str()))),
            PatientSortField::FiscalCode => a.fiscal_code.cmp(&b.fiscal_code),
            PatientSortField::BirthDate => a.birth_date.cmp(&b.birth_date),
            PatientSortField::Gender => a.gender.cmp(&b.gender),
            PatientSortField::Email => a
                .email
                .as_ref()
                .map(|e| e.as_str())
                .cmp(&b.email.as_ref().map(|e| e.as_str())),
            PatientSortField::Phone => a.phone.cmp(&b.phone),
            PatientSortField::City => a.city.as_deref().map(lower).cmp(&b.city.as_deref().map(lower)),
            PatientSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            PatientSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

/// Filters for [`PatientRegistry::search_advanced`]. Every filter is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSearch {
    /// Case-insensitive substring over first/last name, fiscal code, email and phone.
    pub query: Option<String>,
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub has_active_record: Option<bool>,
    /// `Some(true)`: only patients whose PRIVACY consent is given.
    pub privacy_consent: Option<bool>,
    #[serde(default)]
    pub sort_by: PatientSortField,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(flatten)]
    pub page: PageRequest,
}

/// A search hit: the patient plus values computed at query time.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(flatten)]
    pub patient: Patient,
    pub age: Option<u32>,
    pub has_active_record: bool,
}

/// Birth-date bounds equivalent to an age range on `today`.
///
/// Returns `(earliest, latest)`; a patient aged within `[min_age, max_age]` was born
/// in `[earliest, latest]`.
pub fn birth_date_range(
    min_age: Option<u32>,
    max_age: Option<u32>,
    today: NaiveDate,
) -> PatientResult<(Option<NaiveDate>, Option<NaiveDate>)> {
    let years_back = |years: u32| {
        today
            .checked_sub_months(Months::new(years * 12))
            .ok_or_else(|| PatientError::InvalidInput(format!("age {years} is out of range")))
    };

    let latest = min_age.map(years_back).transpose()?;
    let earliest = match max_age {
        Some(age) => {
            let bound = years_back(age + 1)?;
            Some(bound.succ_opt().ok_or_else(|| {
                PatientError::InvalidInput(format!("age {age} is out of range"))
            })?)
        }
        None => None,
    };
    Ok((earliest, latest))
}

/// Trims, uppercases and checks a fiscal code; blank input means "none".
fn checked_fiscal_code(value: Option<String>) -> PatientResult<Option<String>> {
    match optional_text(value) {
        None => Ok(None),
        Some(raw) => {
            let code = fiscal_code::normalize(&raw);
            if fiscal_code::validate(&code) {
                Ok(Some(code))
            } else {
                Err(PatientError::InvalidFiscalCode(raw))
            }
        }
    }
}

fn required(value: &str, field: &str) -> PatientResult<NonEmptyText> {
    NonEmptyText::new(value).map_err(|_| PatientError::InvalidInput(format!("{field} is required")))
}

fn check_birth_date(birth_date: Option<NaiveDate>, today: NaiveDate) -> PatientResult<()> {
    match birth_date {
        Some(date) if date > today => Err(PatientError::InvalidInput(format!(
            "birth date {date} is in the future"
        ))),
        _ => Ok(()),
    }
}

/// Applies a partial text update: `None` keeps, blank clears, anything else replaces.
fn patch(field: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *field = optional_text(Some(value));
    }
}

/// Service for registering and maintaining patients.
#[derive(Clone)]
pub struct PatientRegistry<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> PatientRegistry<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    /// Registers a patient together with refused PRIVACY and MARKETING consents.
    ///
    /// # Errors
    ///
    /// - [`PatientError::InvalidInput`] if a name is blank or the birth date is in the future;
    /// - [`PatientError::InvalidFiscalCode`] if the fiscal code fails its checksum;
    /// - [`PatientError::FiscalCodeTaken`] if another live patient holds the fiscal code.
    pub fn create(&self, data: NewPatient) -> PatientResult<Patient> {
        let now = self.ctx.now();
        check_birth_date(data.birth_date, now.date_naive())?;

        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: required(&data.first_name, "first name")?,
            last_name: required(&data.last_name, "last name")?,
            fiscal_code: checked_fiscal_code(data.fiscal_code)?,
            birth_date: data.birth_date,
            gender: data.gender,
            email: optional_email(data.email)?,
            phone: optional_text(data.phone),
            address: optional_text(data.address),
            city: optional_text(data.city),
            postal_code: optional_text(data.postal_code),
            province: optional_text(data.province).map(|p| p.to_uppercase()),
            occupation: optional_text(data.occupation),
            notes: optional_text(data.notes),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let patient_id = patient.id;
        let stored = patient.clone();
        self.ctx.store.transaction(move |data| {
            data.insert_patient(stored)?;
            for kind in ConsentKind::DEFAULTS {
                data.upsert_consent(patient_id, kind, false, now)?;
            }
            Ok(())
        })?;

        tracing::info!(patient_id = %patient.id, "patient registered");
        Ok(patient)
    }

    pub fn get(&self, id: Uuid) -> PatientResult<Patient> {
        self.ctx.store.read(|data| data.patient(id).cloned())?
    }

    /// Applies a partial update. A changed fiscal code is re-validated and re-checked for
    /// uniqueness against every other live patient.
    pub fn update(&self, id: Uuid, changes: PatientUpdate) -> PatientResult<Patient> {
        let now = self.ctx.now();
        check_birth_date(changes.birth_date, now.date_naive())?;

        let first_name = changes
            .first_name
            .as_deref()
            .map(|v| required(v, "first name"))
            .transpose()?;
        let last_name = changes
            .last_name
            .as_deref()
            .map(|v| required(v, "last name"))
            .transpose()?;
        let fiscal_code = changes
            .fiscal_code
            .map(|v| checked_fiscal_code(Some(v)))
            .transpose()?;
        let email = changes
            .email
            .map(|v| optional_email(Some(v)))
            .transpose()?;

        let updated = self.ctx.store.transaction(|data| {
            let mut patient = data.patient(id)?.clone();
            if let Some(v) = first_name {
                patient.first_name = v;
            }
            if let Some(v) = last_name {
                patient.last_name = v;
            }
            if let Some(v) = fiscal_code {
                patient.fiscal_code = v;
            }
            if let Some(v) = email {
                patient.email = v;
            }
            if changes.birth_date.is_some() {
                patient.birth_date = changes.birth_date;
            }
            if changes.gender.is_some() {
                patient.gender = changes.gender;
            }
            patch(&mut patient.phone, changes.phone);
            patch(&mut patient.address, changes.address);
            patch(&mut patient.city, changes.city);
            patch(&mut patient.postal_code, changes.postal_code);
            patch(&mut patient.province, changes.province.map(|p| p.to_uppercase()));
            patch(&mut patient.occupation, changes.occupation);
            patch(&mut patient.notes, changes.notes);
            patient.updated_at = now;

            data.update_patient(patient.clone())?;
            Ok(patient)
        })?;

        tracing::info!(patient_id = %id, "patient updated");
        Ok(updated)
    }

    /// Soft-deletes a patient. Refused while the patient has an ACTIVE record.
    pub fn delete(&self, id: Uuid) -> PatientResult<()> {
        let now = self.ctx.now();
        let result = self.ctx.store.transaction(|data| {
            let mut patient = data.patient(id)?.clone();
            let open = data
                .records_of(id)
                .iter()
                .filter(|r| r.is_active())
                .count();
            if open > 0 {
                return Err(PatientError::OpenRecordsBlockDelete {
                    patient_id: id,
                    count: open,
                });
            }
            patient.deleted_at = Some(now);
            patient.updated_at = now;
            data.update_patient(patient)
        });

        match &result {
            Ok(()) => tracing::info!(patient_id = %id, "patient soft-deleted"),
            Err(e) => tracing::warn!(patient_id = %id, error = %e, "patient deletion refused"),
        }
        result
    }

    /// Records the patient's decision for one consent purpose.
    pub fn set_consent(&self, patient_id: Uuid, kind: ConsentKind, given: bool) -> PatientResult<Consent> {
        let now = self.ctx.now();
        let consent = self
            .ctx
            .store
            .transaction(|data| data.upsert_consent(patient_id, kind, given, now))?;
        tracing::info!(patient_id = %patient_id, kind = ?kind, given, "consent updated");
        Ok(consent)
    }

    pub fn consents(&self, patient_id: Uuid) -> PatientResult<Vec<Consent>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.patient(patient_id)?;
            Ok(data.consents_of(patient_id).into_iter().cloned().collect())
        })?
    }

    /// Searches live patients.
    ///
    /// The text query matches case-insensitively anywhere in the first name, last name,
    /// fiscal code, email or phone. The age range is turned into a birth-date range, so
    /// patients without a birth date never match an age filter.
    pub fn search_advanced(&self, search: PatientSearch) -> PatientResult<Paginated<PatientSummary>> {
        if let (Some(min), Some(max)) = (search.min_age, search.max_age) {
            if min > max {
                return Err(PatientError::InvalidInput(format!(
                    "minimum age {min} is above maximum age {max}"
                )));
            }
        }
        if search.min_age.max(search.max_age).is_some_and(|a| a > MAX_SEARCH_AGE) {
            return Err(PatientError::InvalidInput(format!(
                "ages above {MAX_SEARCH_AGE} are not searchable"
            )));
        }

        let today = self.ctx.clock.today();
        let (earliest, latest) = birth_date_range(search.min_age, search.max_age, today)?;
        let needle = optional_text(search.query.clone()).map(|q| q.to_lowercase());

        let mut hits = self.ctx.store.read(|data| {
            data.patients()
                .filter(|p| !p.is_deleted())
                .filter(|p| {
                    needle.as_deref().map_or(true, |needle| {
                        [
                            Some(p.first_name.as_str()),
                            Some(p.last_name.as_str()),
                            p.fiscal_code.as_deref(),
                            p.email.as_ref().map(|e| e.as_str()),
                            p.phone.as_deref(),
                        ]
                        .into_iter()
                        .flatten()
                        .any(|field| field.to_lowercase().contains(needle))
                    })
                })
                .filter(|p| search.gender.map_or(true, |g| p.gender == Some(g)))
                .filter(|p| match (earliest, latest) {
                    (None, None) => true,
                    _ => p.birth_date.is_some_and(|birth| {
                        earliest.map_or(true, |e| birth >= e) && latest.map_or(true, |l| birth <= l)
                    }),
                })
                .filter(|p| {
                    search.privacy_consent.map_or(true, |wanted| {
                        let given = data
                            .consent(p.id, ConsentKind::Privacy)
                            .is_some_and(|c| c.given);
                        given == wanted
                    })
                })
                .map(|p| PatientSummary {
                    patient: p.clone(),
                    age: p.age_on(today),
                    has_active_record: data.active_record_of(p.id).is_some(),
                })
                .filter(|s| {
                    search
                        .has_active_record
                        .map_or(true, |wanted| s.has_active_record == wanted)
                })
                .collect::<Vec<_>>()
        })?;

        hits.sort_by(|a, b| {
            search
                .order
                .apply(search.sort_by.compare(&a.patient, &b.patient))
        });
        tracing::debug!(matches = hits.len(), "patient search");
        Paginated::from_sorted(hits, search.page, &self.ctx.cfg)
    }

    /// Aggregate figures across all of a patient's records.
    pub fn statistics(&self, patient_id: Uuid) -> PatientResult<PatientStatistics> {
        let now = self.ctx.now();
        self.ctx
            .store
            .read(|data| statistics::patient_statistics(data, patient_id, now))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::patient::age_on;
    use crate::repositories::ClinicalRecordService;
    use crate::testing::{context, now, patient_input, record_input};
    use crate::ErrorKind;
    use proptest::prelude::*;

    fn registry() -> PatientRegistry<crate::MemoryStore> {
        PatientRegistry::new(context())
    }

    #[test]
    fn create_adds_default_consents() {
        let registry = registry();
        let patient = registry.create(patient_input("Mario", "Rossi")).unwrap();

        let consents = registry.consents(patient.id).unwrap();
        assert_eq!(consents.len(), 2);
        assert!(consents.iter().all(|c| !c.given && c.consent_date == now()));
        let kinds: Vec<_> = consents.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ConsentKind::Privacy, ConsentKind::Marketing]);
    }

    #[test]
    fn create_requires_names() {
        let err = registry().create(patient_input(" ", "Rossi")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("first name"));
    }

    #[test]
    fn create_normalises_and_checks_fiscal_code() {
        let registry = registry();
        let mut input = patient_input("Mario", "Rossi");
        input.fiscal_code = Some(" rssmra85m01h501q ".into());
        let patient = registry.create(input).unwrap();
        assert_eq!(patient.fiscal_code.as_deref(), Some("RSSMRA85M01H501Q"));

        let mut bad = patient_input("Luigi", "Verdi");
        bad.fiscal_code = Some("RSSMRA85M01H501Z".into());
        assert!(matches!(
            registry.create(bad),
            Err(PatientError::InvalidFiscalCode(_))
        ));

        let mut dup = patient_input("Mario", "Rossi");
        dup.fiscal_code = Some("RSSMRA85M01H501Q".into());
        assert!(matches!(
            registry.create(dup),
            Err(PatientError::FiscalCodeTaken(_))
        ));
    }

    #[test]
    fn failed_create_stores_nothing() {
        let registry = registry();
        let mut first = patient_input("Mario", "Rossi");
        first.fiscal_code = Some("RSSMRA85M01H501Q".into());
        registry.create(first.clone()).unwrap();
        assert!(registry.create(first).is_err());

        let page = registry.search_advanced(PatientSearch::default()).unwrap();
        assert_eq!(page.pagination.total, 1);
    }

    #[test]
    fn update_rechecks_fiscal_code_excluding_self() {
        let registry = registry();
        let mut a = patient_input("Mario", "Rossi");
        a.fiscal_code = Some("RSSMRA85M01H501Q".into());
        let a = registry.create(a).unwrap();
        let b = registry.create(patient_input("Giuseppe", "Verdi")).unwrap();

        // Re-submitting one's own code is fine.
        registry
            .update(
                a.id,
                PatientUpdate {
                    fiscal_code: Some("RSSMRA85M01H501Q".into()),
                    city: Some("Roma".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let err = registry
            .update(
                b.id,
                PatientUpdate {
                    fiscal_code: Some("RSSMRA85M01H501Q".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, PatientError::FiscalCodeTaken(_)));
    }

    #[test]
    fn update_blank_clears_optional_fields() {
        let registry = registry();
        let mut input = patient_input("Anna", "Neri");
        input.phone = Some("333 1234567".into());
        let patient = registry.create(input).unwrap();

        let updated = registry
            .update(
                patient.id,
                PatientUpdate {
                    phone: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.phone, None);
        assert_eq!(updated.first_name.as_str(), "Anna");
    }

    #[test]
    fn deleted_patients_are_not_found() {
        let registry = registry();
        let patient = registry.create(patient_input("Anna", "Neri")).unwrap();
        registry.delete(patient.id).unwrap();

        assert!(matches!(
            registry.get(patient.id),
            Err(PatientError::PatientNotFound(_))
        ));
        assert!(matches!(
            registry.update(patient.id, PatientUpdate::default()),
            Err(PatientError::PatientNotFound(_))
        ));
    }

    #[test]
    fn active_record_blocks_delete_until_closed() {
        let ctx = context();
        let registry = PatientRegistry::new(ctx.clone());
        let records = ClinicalRecordService::new(ctx);
        let patient = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let record = records.create(patient.id, record_input("Lombalgia")).unwrap();

        let err = registry.delete(patient.id).unwrap_err();
        assert!(matches!(err, PatientError::OpenRecordsBlockDelete { count: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(registry.get(patient.id).unwrap().deleted_at.is_none());

        records.close(record.id, None).unwrap();
        registry.delete(patient.id).unwrap();
        assert!(matches!(
            registry.get(patient.id),
            Err(PatientError::PatientNotFound(_))
        ));
    }

    #[test]
    fn search_matches_any_text_field_case_insensitively() {
        let registry = registry();
        let mut a = patient_input("Mario", "Rossi");
        a.email = Some("mario.rossi@example.it".into());
        registry.create(a).unwrap();
        let mut b = patient_input("Giulia", "Bianchi");
        b.phone = Some("+39 347 0001122".into());
        registry.create(b).unwrap();

        let by_email = registry
            .search_advanced(PatientSearch {
                query: Some("EXAMPLE.IT".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_email.data.len(), 1);
        assert_eq!(by_email.data[0].patient.last_name.as_str(), "Rossi");

        let by_phone = registry
            .search_advanced(PatientSearch {
                query: Some("0001122".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_phone.data[0].patient.first_name.as_str(), "Giulia");
    }

    #[test]
    fn search_filters_by_age_and_sorts() {
        let registry = registry();
        let today = now().date_naive();
        for (name, years) in [("Alba", 20), ("Bruno", 35), ("Carla", 50)] {
            let mut input = patient_input(name, "Test");
            input.birth_date = today.checked_sub_months(Months::new(years * 12));
            registry.create(input).unwrap();
        }
        registry.create(patient_input("Dario", "Senzadata")).unwrap();

        let page = registry
            .search_advanced(PatientSearch {
                min_age: Some(30),
                max_age: Some(60),
                sort_by: PatientSortField::FirstName,
                order: SortOrder::Desc,
                ..Default::default()
            })
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|s| s.patient.first_name.to_string()).collect();
        assert_eq!(names, vec!["Carla", "Bruno"]);
        assert_eq!(page.data[0].age, Some(50));
    }

    #[test]
    fn search_filters_by_privacy_consent() {
        let registry = registry();
        let a = registry.create(patient_input("Mario", "Rossi")).unwrap();
        registry.create(patient_input("Luigi", "Verdi")).unwrap();
        registry.set_consent(a.id, ConsentKind::Privacy, true).unwrap();

        let page = registry
            .search_advanced(PatientSearch {
                privacy_consent: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].patient.id, a.id);
    }

    #[test]
    fn search_filters_by_gender() {
        let registry = registry();
        for (name, gender) in [("Mario", Gender::Male), ("Giulia", Gender::Female), ("Sara", Gender::Female)] {
            let mut input = patient_input(name, "Test");
            input.gender = Some(gender);
            registry.create(input).unwrap();
        }
        registry.create(patient_input("Ignoto", "Test")).unwrap();

        let page = registry
            .search_advanced(PatientSearch {
                gender: Some(Gender::Female),
                sort_by: PatientSortField::FirstName,
                ..Default::default()
            })
            .unwrap();
        let names: Vec<_> = page.data.iter().map(|s| s.patient.first_name.to_string()).collect();
        assert_eq!(names, vec!["Giulia", "Sara"]);
    }

    #[test]
    fn search_filters_by_active_record() {
        let ctx = context();
        let registry = PatientRegistry::new(ctx.clone());
        let records = ClinicalRecordService::new(ctx);
        let open = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let closed = registry.create(patient_input("Luigi", "Verdi")).unwrap();
        let none = registry.create(patient_input("Anna", "Neri")).unwrap();
        records.create(open.id, record_input("Lombalgia")).unwrap();
        let record = records.create(closed.id, record_input("Cervicalgia")).unwrap();
        records.close(record.id, None).unwrap();

        let with_active = registry
            .search_advanced(PatientSearch {
                has_active_record: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(with_active.pagination.total, 1);
        assert_eq!(with_active.data[0].patient.id, open.id);
        assert!(with_active.data[0].has_active_record);

        let without = registry
            .search_advanced(PatientSearch {
                has_active_record: Some(false),
                ..Default::default()
            })
            .unwrap();
        let mut ids: Vec<_> = without.data.iter().map(|s| s.patient.id).collect();
        ids.sort();
        let mut expected = vec![closed.id, none.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn search_pages_through_results() {
        let registry = registry();
        for i in 0..7 {
            registry.create(patient_input(&format!("Nome{i}"), "Test")).unwrap();
        }

        let page = registry
            .search_advanced(PatientSearch {
                sort_by: PatientSortField::FirstName,
                page: PageRequest::new(3, 3),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].patient.first_name.as_str(), "Nome6");
        assert_eq!(page.pagination.total, 7);
        assert_eq!(page.pagination.page, 3);
        assert_eq!(page.pagination.limit, 3);
        assert_eq!(page.pagination.pages, 3);
    }

    #[test]
    fn search_rejects_inverted_age_range() {
        let err = registry()
            .search_advanced(PatientSearch {
                min_age: Some(60),
                max_age: Some(30),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    proptest! {
        #[test]
        fn birth_date_range_agrees_with_age(
            birth_offset in 0i64..40_000,
            today_offset in 0i64..3_000,
            min_age in 0u32..100,
            span in 0u32..20,
        ) {
            let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            let today = base + chrono::Duration::days(today_offset);
            let birth = today - chrono::Duration::days(birth_offset);
            let max_age = min_age + span;

            let (earliest, latest) = birth_date_range(Some(min_age), Some(max_age), today).unwrap();
            let in_range = earliest.map_or(true, |e| birth >= e) && latest.map_or(true, |l| birth <= l);
            let age = age_on(birth, today).unwrap();
            prop_assert_eq!(in_range, (min_age..=max_age).contains(&age));
        }
    }
}
