//! Domain entities as stored in the [`crate::store::Dataset`].

pub mod observation;
pub mod patient;
pub mod record;
pub mod session;
pub mod therapy;

pub use observation::{
    BodyMapping, BodySide, Document, DocumentCategory, NewBodyMapping, NewDocument, NewVitalSigns,
    VitalSigns,
};
pub use patient::{Consent, ConsentKind, Gender, NewPatient, Patient, PatientUpdate};
pub use record::{ClinicalRecord, NewRecord, RecordOverrides, RecordSection, RecordStatus};
pub use session::{SessionOutcome, SessionStatus, TherapySession};
pub use therapy::{
    therapy_type, Exercise, NewTherapy, Pressure, Therapy, TherapyCategory, TherapyParameters,
    TherapyStatus, TherapyType, THERAPY_TYPES,
};
