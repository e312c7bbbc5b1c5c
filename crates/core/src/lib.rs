//! # Fisio Core
//!
//! Domain layer of the physiotherapy clinic record system.
//!
//! This crate owns the entity lifecycles and the derived computations:
//! - patient registration, search and consents ([`PatientRegistry`]);
//! - clinical records and their ACTIVE/CLOSED state machine ([`ClinicalRecordService`]);
//! - therapy courses and session outcomes ([`TherapyService`], [`SessionService`]);
//! - vital signs, body maps and document metadata ([`ObservationService`]);
//! - the record timeline and per-record/per-patient statistics.
//!
//! Persistence goes through the [`Store`] port. [`MemoryStore`] keeps everything in
//! memory, [`YamlFileStore`] persists the whole dataset to one YAML file.
//!
//! **No transport concerns**: argument parsing, output formatting and logging setup
//! belong to the `fisio-cli` binary.

pub mod config;
pub mod constants;
pub mod context;
pub mod demo;
pub mod error;
pub mod fiscal_code;
pub mod model;
pub mod paging;
pub mod repositories;
pub mod statistics;
pub mod store;
pub mod templates;
pub mod timeline;
pub mod vas;

#[cfg(test)]
mod testing;

pub use config::CoreConfig;
pub use context::{Clock, CoreContext, FixedClock, RecordNumberSource, SystemClock};
pub use error::{ErrorKind, PatientError, PatientResult};
pub use model::*;
pub use paging::{PageRequest, Paginated, Pagination, SortOrder};
pub use repositories::{
    ClinicalRecordService, ObservationService, PatientRegistry, PatientSearch, PatientSortField,
    PatientSummary, RecordSearch, RecordSummary, SessionService, TherapyService,
};
pub use statistics::{PatientStatistics, RecordStatistics, TherapyProgress, VasTrendPoint};
pub use store::{Dataset, MemoryStore, Store, YamlFileStore};
pub use templates::{RecordTemplate, TEMPLATES};
pub use timeline::{EventPayload, TimelineEvent, TimelineEventType};
