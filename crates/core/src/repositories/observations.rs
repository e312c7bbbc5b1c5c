//! Observation log: vital signs, body-map pain entries and document metadata.

use fisio_types::{NonEmptyText, VasScore};
use uuid::Uuid;

use crate::context::CoreContext;
use crate::model::patient::optional_text;
use crate::model::{
    BodyMapping, Document, NewBodyMapping, NewDocument, NewVitalSigns, VitalSigns,
};
use crate::store::Store;
use crate::{PatientError, PatientResult};

#[derive(Clone)]
pub struct ObservationService<S> {
    ctx: CoreContext<S>,
}

impl<S: Store> ObservationService<S> {
    pub fn new(ctx: CoreContext<S>) -> Self {
        Self { ctx }
    }

    /// Logs vital signs for a patient, optionally against one of their records.
    pub fn record_vital_signs(
        &self,
        patient_id: Uuid,
        record_id: Option<Uuid>,
        input: NewVitalSigns,
    ) -> PatientResult<VitalSigns> {
        input.validate()?;
        let vitals = VitalSigns {
            id: Uuid::new_v4(),
            patient_id,
            record_id,
            systolic_pressure: input.systolic_pressure,
            diastolic_pressure: input.diastolic_pressure,
            heart_rate: input.heart_rate,
            temperature: input.temperature,
            oxygen_saturation: input.oxygen_saturation,
            weight_kg: input.weight_kg,
            height_cm: input.height_cm,
            notes: optional_text(input.notes),
            measured_at: input.measured_at.unwrap_or_else(|| self.ctx.now()),
        };

        let stored = vitals.clone();
        self.ctx.store.transaction(|data| {
            check_owner(data, patient_id, record_id)?;
            data.insert_vital_signs(stored)
        })?;
        tracing::info!(patient_id = %patient_id, "vital signs recorded");
        Ok(vitals)
    }

    /// Adds a body-map entry to a record. The patient is the record's owner.
    pub fn add_body_mapping(&self, record_id: Uuid, input: NewBodyMapping) -> PatientResult<BodyMapping> {
        let body_region = NonEmptyText::new(&input.body_region)
            .map_err(|_| PatientError::InvalidInput("body region is required".into()))?;
        let pain_intensity = input.pain_intensity.map(VasScore::new).transpose()?;
        let recorded_at = input.recorded_at.unwrap_or_else(|| self.ctx.now());

        let mapping = self.ctx.store.transaction(|data| {
            let patient_id = data.record(record_id)?.patient_id;
            let mapping = BodyMapping {
                id: Uuid::new_v4(),
                patient_id,
                record_id,
                body_region,
                side: input.side,
                pain_intensity,
                pain_type: optional_text(input.pain_type),
                notes: optional_text(input.notes),
                recorded_at,
            };
            data.insert_body_mapping(mapping.clone())?;
            Ok(mapping)
        })?;
        tracing::info!(record_id = %record_id, region = %mapping.body_region, "body mapping added");
        Ok(mapping)
    }

    /// Stores the metadata of a document uploaded elsewhere.
    pub fn add_document(
        &self,
        patient_id: Uuid,
        record_id: Option<Uuid>,
        input: NewDocument,
    ) -> PatientResult<Document> {
        let file_name = NonEmptyText::new(&input.file_name)
            .map_err(|_| PatientError::InvalidInput("file name is required".into()))?;
        let document = Document {
            id: Uuid::new_v4(),
            patient_id,
            record_id,
            file_name,
            category: input.category,
            description: optional_text(input.description),
            uploaded_at: input.uploaded_at.unwrap_or_else(|| self.ctx.now()),
        };

        let stored = document.clone();
        self.ctx.store.transaction(|data| {
            check_owner(data, patient_id, record_id)?;
            data.insert_document(stored)
        })?;
        tracing::info!(patient_id = %patient_id, category = %document.category, "document registered");
        Ok(document)
    }

    pub fn vital_signs(&self, record_id: Uuid) -> PatientResult<Vec<VitalSigns>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.record(record_id)?;
            Ok(data.vital_signs_of(record_id).into_iter().cloned().collect())
        })?
    }

    pub fn body_mappings(&self, record_id: Uuid) -> PatientResult<Vec<BodyMapping>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.record(record_id)?;
            Ok(data.body_mappings_of(record_id).into_iter().cloned().collect())
        })?
    }

    /// All of a patient's documents, whether or not attached to a record.
    pub fn documents(&self, patient_id: Uuid) -> PatientResult<Vec<Document>> {
        self.ctx.store.read(|data| -> PatientResult<_> {
            data.patient(patient_id)?;
            Ok(data.documents_of_patient(patient_id).into_iter().cloned().collect())
        })?
    }
}

/// A record given alongside a patient must belong to that patient.
fn check_owner(data: &crate::Dataset, patient_id: Uuid, record_id: Option<Uuid>) -> PatientResult<()> {
    if let Some(record_id) = record_id {
        if data.record(record_id)?.patient_id != patient_id {
            return Err(PatientError::InvalidInput(format!(
                "record {record_id} does not belong to patient {patient_id}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BodySide, DocumentCategory};
    use crate::repositories::{ClinicalRecordService, PatientRegistry};
    use crate::testing::{context, now, patient_input, record_input};
    use crate::{ErrorKind, MemoryStore};

    fn setup() -> (ObservationService<MemoryStore>, Uuid, Uuid, Uuid) {
        let ctx = context();
        let registry = PatientRegistry::new(ctx.clone());
        let patient = registry.create(patient_input("Mario", "Rossi")).unwrap();
        let other = registry.create(patient_input("Luigi", "Verdi")).unwrap();
        let record = ClinicalRecordService::new(ctx.clone())
            .create(patient.id, record_input("Lombalgia"))
            .unwrap();
        (ObservationService::new(ctx), patient.id, other.id, record.id)
    }

    #[test]
    fn vital_signs_default_to_now_and_list_by_record() {
        let (obs, patient_id, _, record_id) = setup();
        let vitals = obs
            .record_vital_signs(
                patient_id,
                Some(record_id),
                NewVitalSigns {
                    systolic_pressure: Some(125),
                    diastolic_pressure: Some(82),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(vitals.measured_at, now());
        assert_eq!(obs.vital_signs(record_id).unwrap().len(), 1);
    }

    #[test]
    fn record_must_belong_to_the_patient() {
        let (obs, _, other_id, record_id) = setup();
        let err = obs
            .record_vital_signs(other_id, Some(record_id), NewVitalSigns::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn body_mapping_checks_pain_scale() {
        let (obs, patient_id, _, record_id) = setup();
        let mut input = NewBodyMapping {
            body_region: "Rachide lombare".into(),
            side: Some(BodySide::Bilateral),
            pain_intensity: Some(12),
            ..Default::default()
        };
        assert_eq!(
            obs.add_body_mapping(record_id, input.clone()).unwrap_err().kind(),
            ErrorKind::Validation
        );

        input.pain_intensity = Some(6);
        let mapping = obs.add_body_mapping(record_id, input).unwrap();
        assert_eq!(mapping.patient_id, patient_id);
        assert_eq!(obs.body_mappings(record_id).unwrap().len(), 1);
    }

    #[test]
    fn documents_are_listed_per_patient() {
        let (obs, patient_id, _, record_id) = setup();
        for (name, record) in [("rx_lombare.pdf", Some(record_id)), ("impegnativa.pdf", None)] {
            obs.add_document(
                patient_id,
                record,
                NewDocument {
                    file_name: name.into(),
                    category: DocumentCategory::Imaging,
                    description: None,
                    uploaded_at: None,
                },
            )
            .unwrap();
        }
        assert_eq!(obs.documents(patient_id).unwrap().len(), 2);
    }
}
