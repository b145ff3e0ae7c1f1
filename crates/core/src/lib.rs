//! # Clinic Core
//!
//! Core business logic for the clinic's pre-visit questionnaire workflow.
//!
//! This crate contains pure data operations:
//! - Patient and appointment records in a local SQLite database
//! - Issuing tokenised questionnaire links, with lazy seven-day expiry
//! - Recording submissions and writing the medical history back to the patient
//! - Best-effort email/SMS delivery of links and appointment reminders
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and `cli`.
//!
//! Services are built once at startup from an [`Arc<Database>`](Database), an
//! [`Arc<CoreConfig>`](CoreConfig) and an `Arc<dyn NotificationService>`, then cloned freely.

pub mod appointment;
pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
mod error;
pub mod notifications;
pub mod patient;
pub mod questionnaire;
pub mod repositories;
pub mod workflow;

pub use appointment::{Appointment, AppointmentService, AppointmentStatus, NewAppointment};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use db::Database;
pub use error::{ClinicError, ClinicResult};
pub use notifications::{
    DisabledNotificationService, HttpNotificationService, NotificationConfig,
    NotificationService,
};
pub use patient::{Gender, MedicalHistory, NewPatient, Patient, PatientService};
pub use questionnaire::{
    Availability, ExpiryPolicy, Questionnaire, QuestionnaireAnswers, QuestionnaireStatus,
};
pub use workflow::{
    ChannelOutcome, DispatchReport, IssueRequest, Issued, NotifyVia, QuestionnaireService,
    QuestionnaireView,
};

pub use clinic_token::AccessToken;
pub use clinic_types::{ClockTime, Cpf, EmailAddress, NonEmptyText, TextError};
