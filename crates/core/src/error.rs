use uuid::Uuid;

/// Coarse classification of a [`PatientError`], used by callers that map failures onto
/// their own transport (exit codes, status codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// The request is well formed but clashes with current state.
    Conflict,
    /// A referenced entity does not exist (or has been soft-deleted).
    NotFound,
    /// The persistence layer failed.
    Storage,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    // -- validation ---------------------------------------------------------
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text: {0}")]
    Text(#[from] fisio_types::TextError),
    #[error("invalid identifier: {0}")]
    Id(#[from] fisio_ids::IdError),
    #[error("invalid fiscal code: '{0}'")]
    InvalidFiscalCode(String),
    #[error("therapy type {therapy_type} expects {expected} parameters, got {actual}")]
    ParameterCategoryMismatch {
        therapy_type: String,
        expected: String,
        actual: String,
    },

    // -- conflict -----------------------------------------------------------
    #[error("fiscal code already registered: {0}")]
    FiscalCodeTaken(String),
    #[error("record number already in use: {0}")]
    RecordNumberTaken(String),
    #[error("therapy {therapy_id} already has a session number {session_number}")]
    SessionNumberTaken { therapy_id: Uuid, session_number: u32 },
    #[error("patient {patient_id} already has an active clinical record")]
    ActiveRecordExists { patient_id: Uuid },
    #[error("clinical record {record_id} has {count} scheduled or in-progress therapies")]
    ActiveTherapiesBlockClose { record_id: Uuid, count: usize },
    #[error("patient {patient_id} has {count} active clinical records")]
    OpenRecordsBlockDelete { patient_id: Uuid, count: usize },
    #[error("clinical record {0} is closed")]
    RecordClosed(Uuid),
    #[error("illegal {entity} transition: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
    #[error("therapy {therapy_id} already has all {prescribed} prescribed sessions")]
    SessionLimitReached { therapy_id: Uuid, prescribed: u32 },
    #[error("therapy {therapy_id} is {status} and cannot take new sessions")]
    TherapyNotSchedulable { therapy_id: Uuid, status: String },

    // -- not found ----------------------------------------------------------
    #[error("patient not found: {0}")]
    PatientNotFound(Uuid),
    #[error("clinical record not found: {0}")]
    RecordNotFound(Uuid),
    #[error("therapy not found: {0}")]
    TherapyNotFound(Uuid),
    #[error("therapy session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("unknown therapy type: {0}")]
    TherapyTypeNotFound(String),
    #[error("unknown clinical record template: {0}")]
    TemplateNotFound(String),

    // -- storage ------------------------------------------------------------
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read data file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write data file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(String),
    #[error("store lock poisoned")]
    StoreLockPoisoned,
}

impl PatientError {
    pub fn kind(&self) -> ErrorKind {
        use PatientError as E;
        match self {
            E::InvalidInput(_)
            | E::Text(_)
            | E::Id(_)
            | E::InvalidFiscalCode(_)
            | E::ParameterCategoryMismatch { .. } => ErrorKind::Validation,

            E::FiscalCodeTaken(_)
            | E::RecordNumberTaken(_)
            | E::SessionNumberTaken { .. }
            | E::ActiveRecordExists { .. }
            | E::ActiveTherapiesBlockClose { .. }
            | E::OpenRecordsBlockDelete { .. }
            | E::RecordClosed(_)
            | E::IllegalTransition { .. }
            | E::SessionLimitReached { .. }
            | E::TherapyNotSchedulable { .. } => ErrorKind::Conflict,

            E::PatientNotFound(_)
            | E::RecordNotFound(_)
            | E::TherapyNotFound(_)
            | E::SessionNotFound(_)
            | E::TherapyTypeNotFound(_)
            | E::TemplateNotFound(_) => ErrorKind::NotFound,

            E::StorageDirCreation(_)
            | E::FileRead(_)
            | E::FileWrite(_)
            | E::YamlSerialization(_)
            | E::YamlDeserialization(_)
            | E::StoreLockPoisoned => ErrorKind::Storage,
        }
    }
}

pub type PatientResult<T> = std::result::Result<T, PatientError>;
