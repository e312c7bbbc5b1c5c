use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::model::{
    BodyMapping, ClinicalRecord, Consent, ConsentKind, Document, Patient, Therapy, TherapySession,
    VitalSigns,
};
use crate::{PatientError, PatientResult};

/// Every table of the clinic, keyed by entity id.
///
/// Mutators enforce the storage constraints:
/// - a fiscal code belongs to at most one non-deleted patient;
/// - record numbers are unique;
/// - a patient has at most one ACTIVE record, and only a non-deleted patient has one;
/// - child rows reference an existing parent;
/// - session numbers are unique within a therapy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    patients: BTreeMap<Uuid, Patient>,
    #[serde(default)]
    consents: BTreeMap<Uuid, Consent>,
    #[serde(default)]
    records: BTreeMap<Uuid, ClinicalRecord>,
    #[serde(default)]
    therapies: BTreeMap<Uuid, Therapy>,
    #[serde(default)]
    sessions: BTreeMap<Uuid, TherapySession>,
    #[serde(default)]
    vital_signs: BTreeMap<Uuid, VitalSigns>,
    #[serde(default)]
    body_mappings: BTreeMap<Uuid, BodyMapping>,
    #[serde(default)]
    documents: BTreeMap<Uuid, Document>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    // -- patients -------------------------------------------------------------

    /// All patients, soft-deleted ones included.
    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    /// A non-deleted patient.
    pub fn patient(&self, id: Uuid) -> PatientResult<&Patient> {
        self.patients
            .get(&id)
            .filter(|p| !p.is_deleted())
            .ok_or(PatientError::PatientNotFound(id))
    }

    pub fn fiscal_code_owner(&self, fiscal_code: &str) -> Option<&Patient> {
        self.patients
            .values()
            .find(|p| !p.is_deleted() && p.fiscal_code.as_deref() == Some(fiscal_code))
    }

    pub fn insert_patient(&mut self, patient: Patient) -> PatientResult<()> {
        self.check_fiscal_code(&patient)?;
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    /// Replaces a stored patient. The patient must already exist.
    pub fn update_patient(&mut self, patient: Patient) -> PatientResult<()> {
        if !self.patients.contains_key(&patient.id) {
            return Err(PatientError::PatientNotFound(patient.id));
        }
        self.check_fiscal_code(&patient)?;
        self.patients.insert(patient.id, patient);
        Ok(())
    }

    fn check_fiscal_code(&self, patient: &Patient) -> PatientResult<()> {
        if patient.is_deleted() {
            return Ok(());
        }
        match patient.fiscal_code.as_deref().and_then(|c| self.fiscal_code_owner(c)) {
            Some(owner) if owner.id != patient.id => Err(PatientError::FiscalCodeTaken(
                patient.fiscal_code.clone().unwrap_or_default(),
            )),
            _ => Ok(()),
        }
    }

    // -- consents -------------------------------------------------------------

    pub fn consents_of(&self, patient_id: Uuid) -> Vec<&Consent> {
        let mut consents: Vec<_> = self
            .consents
            .values()
            .filter(|c| c.patient_id == patient_id)
            .collect();
        consents.sort_by_key(|c| c.kind);
        consents
    }

    pub fn consent(&self, patient_id: Uuid, kind: ConsentKind) -> Option<&Consent> {
        self.consents
            .values()
            .find(|c| c.patient_id == patient_id && c.kind == kind)
    }

    /// Inserts or replaces the single consent row for `(patient, kind)`.
    pub fn upsert_consent(
        &mut self,
        patient_id: Uuid,
        kind: ConsentKind,
        given: bool,
        now: DateTime<Utc>,
    ) -> PatientResult<Consent> {
        self.patient(patient_id)?;
        let id = self
            .consent(patient_id, kind)
            .map_or_else(Uuid::new_v4, |c| c.id);
        let consent = Consent {
            id,
            patient_id,
            kind,
            given,
            consent_date: now,
        };
        self.consents.insert(id, consent.clone());
        Ok(consent)
    }

    // -- clinical records -----------------------------------------------------

    pub fn records(&self) -> impl Iterator<Item = &ClinicalRecord> {
        self.records.values()
    }

    pub fn record(&self, id: Uuid) -> PatientResult<&ClinicalRecord> {
        self.records.get(&id).ok_or(PatientError::RecordNotFound(id))
    }

    /// A patient's records, oldest first.
    pub fn records_of(&self, patient_id: Uuid) -> Vec<&ClinicalRecord> {
        let mut records: Vec<_> = self
            .records
            .values()
            .filter(|r| r.patient_id == patient_id)
            .collect();
        records.sort_by_key(|r| r.created_at);
        records
    }

    pub fn active_record_of(&self, patient_id: Uuid) -> Option<&ClinicalRecord> {
        self.records
            .values()
            .find(|r| r.patient_id == patient_id && r.is_active())
    }

    pub fn insert_record(&mut self, record: ClinicalRecord) -> PatientResult<()> {
        self.patient(record.patient_id)?;
        self.check_record(&record)?;
        self.records.insert(record.id, record);
        Ok(())
    }

    pub fn update_record(&mut self, record: ClinicalRecord) -> PatientResult<()> {
        self.record(record.id)?;
        self.check_record(&record)?;
        self.records.insert(record.id, record);
        Ok(())
    }

    fn check_record(&self, record: &ClinicalRecord) -> PatientResult<()> {
        let number_taken = self
            .records
            .values()
            .any(|r| r.id != record.id && r.record_number == record.record_number);
        if number_taken {
            return Err(PatientError::RecordNumberTaken(record.record_number.clone()));
        }
        if record.is_active() {
            self.patient(record.patient_id)?;
            if let Some(other) = self.active_record_of(record.patient_id) {
                if other.id != record.id {
                    return Err(PatientError::ActiveRecordExists {
                        patient_id: record.patient_id,
                    });
                }
            }
        }
        Ok(())
    }

    // -- therapies ------------------------------------------------------------

    pub fn therapy(&self, id: Uuid) -> PatientResult<&Therapy> {
        self.therapies.get(&id).ok_or(PatientError::TherapyNotFound(id))
    }

    pub fn therapy_mut(&mut self, id: Uuid) -> PatientResult<&mut Therapy> {
        self.therapies
            .get_mut(&id)
            .ok_or(PatientError::TherapyNotFound(id))
    }

    /// A record's therapies in prescription order.
    pub fn therapies_of(&self, record_id: Uuid) -> Vec<&Therapy> {
        let mut therapies: Vec<_> = self
            .therapies
            .values()
            .filter(|t| t.record_id == record_id)
            .collect();
        therapies.sort_by_key(|t| t.created_at);
        therapies
    }

    pub fn insert_therapy(&mut self, therapy: Therapy) -> PatientResult<()> {
        self.record(therapy.record_id)?;
        self.therapies.insert(therapy.id, therapy);
        Ok(())
    }

    // -- sessions -------------------------------------------------------------

    pub fn session(&self, id: Uuid) -> PatientResult<&TherapySession> {
        self.sessions.get(&id).ok_or(PatientError::SessionNotFound(id))
    }

    pub fn session_mut(&mut self, id: Uuid) -> PatientResult<&mut TherapySession> {
        self.sessions
            .get_mut(&id)
            .ok_or(PatientError::SessionNotFound(id))
    }

    /// A therapy's sessions ordered by session number.
    pub fn sessions_of(&self, therapy_id: Uuid) -> Vec<&TherapySession> {
        let mut sessions: Vec<_> = self
            .sessions
            .values()
            .filter(|s| s.therapy_id == therapy_id)
            .collect();
        sessions.sort_by_key(|s| s.session_number);
        sessions
    }

    pub fn insert_session(&mut self, session: TherapySession) -> PatientResult<()> {
        self.therapy(session.therapy_id)?;
        let clash = self
            .sessions
            .values()
            .any(|s| s.therapy_id == session.therapy_id && s.session_number == session.session_number);
        if clash {
            return Err(PatientError::SessionNumberTaken {
                therapy_id: session.therapy_id,
                session_number: session.session_number,
            });
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    // -- observations ---------------------------------------------------------

    pub fn vital_signs_of(&self, record_id: Uuid) -> Vec<&VitalSigns> {
        let mut vitals: Vec<_> = self
            .vital_signs
            .values()
            .filter(|v| v.record_id == Some(record_id))
            .collect();
        vitals.sort_by_key(|v| v.measured_at);
        vitals
    }

    pub fn insert_vital_signs(&mut self, vitals: VitalSigns) -> PatientResult<()> {
        self.patient(vitals.patient_id)?;
        if let Some(record_id) = vitals.record_id {
            self.record(record_id)?;
        }
        self.vital_signs.insert(vitals.id, vitals);
        Ok(())
    }

    pub fn body_mappings_of(&self, record_id: Uuid) -> Vec<&BodyMapping> {
        let mut mappings: Vec<_> = self
            .body_mappings
            .values()
            .filter(|m| m.record_id == record_id)
            .collect();
        mappings.sort_by_key(|m| m.recorded_at);
        mappings
    }

    pub fn insert_body_mapping(&mut self, mapping: BodyMapping) -> PatientResult<()> {
        self.patient(mapping.patient_id)?;
        self.record(mapping.record_id)?;
        self.body_mappings.insert(mapping.id, mapping);
        Ok(())
    }

    pub fn documents_of_record(&self, record_id: Uuid) -> Vec<&Document> {
        let mut documents: Vec<_> = self
            .documents
            .values()
            .filter(|d| d.record_id == Some(record_id))
            .collect();
        documents.sort_by_key(|d| d.uploaded_at);
        documents
    }

    pub fn documents_of_patient(&self, patient_id: Uuid) -> Vec<&Document> {
        let mut documents: Vec<_> = self
            .documents
            .values()
            .filter(|d| d.patient_id == patient_id)
            .collect();
        documents.sort_by_key(|d| d.uploaded_at);
        documents
    }

    pub fn insert_document(&mut self, document: Document) -> PatientResult<()> {
        self.patient(document.patient_id)?;
        if let Some(record_id) = document.record_id {
            self.record(record_id)?;
        }
        self.documents.insert(document.id, document);
        Ok(())
    }

    // -- traversal ------------------------------------------------------------

    /// Every session of every therapy of `record_id`.
    pub fn sessions_of_record(&self, record_id: Uuid) -> Vec<&TherapySession> {
        self.therapies_of(record_id)
            .into_iter()
            .flat_map(|t| self.sessions_of(t.id))
            .collect()
    }

    /// Every session of every record of `patient_id`.
    pub fn sessions_of_patient(&self, patient_id: Uuid) -> Vec<&TherapySession> {
        self.records_of(patient_id)
            .into_iter()
            .flat_map(|r| self.sessions_of_record(r.id))
            .collect()
    }
}
