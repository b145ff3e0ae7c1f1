//! Constants used throughout the clinic core crate.

/// Default location of the SQLite database when no explicit path is configured.
pub const DEFAULT_DATABASE_PATH: &str = "clinic_data/clinic.db";

/// Days a pending questionnaire link stays fillable.
pub const DEFAULT_QUESTIONNAIRE_EXPIRY_DAYS: u32 = 7;

/// Longest configurable link validity (ten years).
pub const MAX_QUESTIONNAIRE_EXPIRY_DAYS: u32 = 3650;

/// Country calling code assumed for phone numbers stored without one (Brazil).
pub const DEFAULT_COUNTRY_CODE: &str = "55";

/// Display name used in outgoing messages when none is configured.
pub const DEFAULT_CLINIC_NAME: &str = "Dental Clinic";

/// Sender address used when `FROM_EMAIL` is not set.
pub const DEFAULT_FROM_EMAIL: &str = "noreply@clinic.example";

/// Path segment under which patient-facing questionnaire links are served.
pub const QUESTIONNAIRE_LINK_PREFIX: &str = "q";

/// Number of times issuance regenerates a token after a UNIQUE collision.
pub const TOKEN_INSERT_ATTEMPTS: usize = 3;

/// SendGrid v3 API origin.
pub const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// Twilio REST API origin.
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Per-request timeout for notification providers, in seconds.
pub const NOTIFICATION_TIMEOUT_SECS: u64 = 10;
