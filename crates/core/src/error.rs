#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid text field: {0}")]
    Text(#[from] clinic_types::TextError),

    #[error("patient {0} not found")]
    PatientNotFound(i64),
    #[error("appointment {0} not found")]
    AppointmentNotFound(i64),
    #[error("questionnaire not found")]
    QuestionnaireNotFound,
    #[error("a patient with CPF {0} is already registered")]
    DuplicateCpf(String),
    #[error("token collision on insert")]
    DuplicateToken,

    #[error("questionnaire has already been filled")]
    AlreadyFilled,
    #[error("questionnaire link has expired")]
    Expired,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },
    #[error("failed to create database directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("invalid stored value for {field}: {value}")]
    InvalidStoredValue { field: &'static str, value: String },
    #[error("invalid timestamp")]
    InvalidTimestamp,
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
