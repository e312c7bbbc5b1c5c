//! Domain services.
//!
//! Each service is a cheap, cloneable value built from a [`crate::CoreContext`]. They
//! hold no state of their own; all data lives in the context's store.

pub mod observations;
pub mod patients;
pub mod records;
pub mod sessions;
pub mod therapies;

pub use observations::ObservationService;
pub use patients::{PatientRegistry, PatientSearch, PatientSortField, PatientSummary};
pub use records::{ClinicalRecordService, RecordSearch, RecordSummary};
pub use sessions::SessionService;
pub use therapies::TherapyService;
