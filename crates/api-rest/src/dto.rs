//! Request and response bodies.
//!
//! Dates travel as `YYYY-MM-DD`, clock times as `HH:MM`, and instants as RFC 3339 UTC strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use clinic_core::{
    Appointment, Availability, ChannelOutcome, ClinicError, ClinicResult, CoreConfig, Cpf,
    DispatchReport, EmailAddress, Gender, NewAppointment, NewPatient, NonEmptyText, Patient,
    Questionnaire, QuestionnaireAnswers, QuestionnaireView,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

fn instant(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_date(field: &str, raw: &str) -> ClinicResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ClinicError::InvalidInput(format!("{field} must be a YYYY-MM-DD date, got '{raw}'"))
    })
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    pub name: String,
    /// `YYYY-MM-DD`
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// 11 digits, with or without `000.000.000-00` punctuation
    pub cpf: Option<String>,
    /// `male`, `female`, `other` or `prefer_not_to_say`
    pub gender: Option<String>,
    pub diseases: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
    pub surgeries: Option<String>,
    pub habits: Option<String>,
    pub notes: Option<String>,
}

impl CreatePatientReq {
    pub fn into_new_patient(self) -> ClinicResult<NewPatient> {
        let mut new = NewPatient::named(NonEmptyText::new(&self.name)?);
        new.birth_date = blank_to_none(self.birth_date)
            .map(|d| parse_date("birth_date", &d))
            .transpose()?;
        new.phone = blank_to_none(self.phone);
        new.email = blank_to_none(self.email)
            .map(EmailAddress::parse)
            .transpose()?;
        new.address = blank_to_none(self.address);
        new.cpf = blank_to_none(self.cpf).map(Cpf::parse).transpose()?;
        new.gender = blank_to_none(self.gender)
            .map(|g| g.parse::<Gender>())
            .transpose()?;
        new.diseases = blank_to_none(self.diseases);
        new.medications = blank_to_none(self.medications);
        new.allergies = blank_to_none(self.allergies);
        new.surgeries = blank_to_none(self.surgeries);
        new.habits = blank_to_none(self.habits);
        new.notes = blank_to_none(self.notes);
        Ok(new)
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: i64,
    pub name: String,
    pub birth_date: Option<String>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub cpf: Option<String>,
    pub gender: Option<String>,
    pub diseases: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
    pub surgeries: Option<String>,
    pub habits: Option<String>,
    pub notes: Option<String>,
    pub registered_at: String,
}

impl PatientRes {
    pub fn new(patient: Patient, today: NaiveDate) -> Self {
        Self {
            id: patient.id,
            age: patient.age_on(today),
            name: patient.name.to_string(),
            birth_date: patient.birth_date.map(|d| d.to_string()),
            phone: patient.phone,
            email: patient.email.map(|e| e.to_string()),
            address: patient.address,
            cpf: patient.cpf.map(|c| c.to_string()),
            gender: patient.gender.map(|g| g.to_string()),
            diseases: patient.diseases,
            medications: patient.medications,
            allergies: patient.allergies,
            surgeries: patient.surgeries,
            habits: patient.habits,
            notes: patient.notes,
            registered_at: instant(patient.registered_at),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PatientSearchQuery {
    /// Name or CPF fragment
    pub q: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateAppointmentReq {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`, 24-hour clock
    pub time: String,
    pub kind: String,
    pub notes: Option<String>,
}

impl CreateAppointmentReq {
    pub fn into_new_appointment(self) -> ClinicResult<NewAppointment> {
        Ok(NewAppointment {
            date: parse_date("date", &self.date)?,
            time: self.time.parse()?,
            kind: NonEmptyText::new(&self.kind)?,
            notes: blank_to_none(self.notes),
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AppointmentRes {
    pub id: i64,
    pub patient_id: i64,
    pub date: String,
    pub time: String,
    pub kind: String,
    pub notes: Option<String>,
    pub status: String,
    /// e.g. `14/03/2026 - 09:30 - Cleaning`
    pub label: String,
    pub registered_at: String,
}

impl From<Appointment> for AppointmentRes {
    fn from(appointment: Appointment) -> Self {
        Self {
            label: appointment.label(),
            id: appointment.id,
            patient_id: appointment.patient_id,
            date: appointment.date.to_string(),
            time: appointment.time.to_string(),
            kind: appointment.kind.to_string(),
            notes: appointment.notes,
            status: appointment.status.to_string(),
            registered_at: instant(appointment.registered_at),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ListAppointmentsRes {
    pub appointments: Vec<AppointmentRes>,
}

#[derive(Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AnswersDto {
    pub medical_history: Option<String>,
    pub complaints: Option<String>,
    pub current_medications: Option<String>,
    pub allergies: Option<String>,
    pub notes: Option<String>,
}

impl From<QuestionnaireAnswers> for AnswersDto {
    fn from(a: QuestionnaireAnswers) -> Self {
        Self {
            medical_history: a.medical_history,
            complaints: a.complaints,
            current_medications: a.current_medications,
            allergies: a.allergies,
            notes: a.notes,
        }
    }
}

impl From<AnswersDto> for QuestionnaireAnswers {
    fn from(a: AnswersDto) -> Self {
        Self {
            medical_history: a.medical_history,
            complaints: a.complaints,
            current_medications: a.current_medications,
            allergies: a.allergies,
            notes: a.notes,
        }
    }
}

/// Staff view of a questionnaire.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct QuestionnaireRes {
    pub id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    /// `pending`, `filled` or `expired`
    pub status: String,
    pub link: String,
    pub sent_at: String,
    pub expires_at: String,
    pub filled_at: Option<String>,
    pub answers: AnswersDto,
}

impl QuestionnaireRes {
    pub fn new(q: Questionnaire, cfg: &CoreConfig) -> Self {
        Self {
            link: cfg.questionnaire_link(&q.token),
            expires_at: instant(cfg.expiry().expires_at(q.sent_at)),
            id: q.id,
            patient_id: q.patient_id,
            appointment_id: q.appointment_id,
            status: q.status.to_string(),
            sent_at: instant(q.sent_at),
            filled_at: q.filled_at.map(instant),
            answers: q.answers.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ListQuestionnairesRes {
    pub questionnaires: Vec<QuestionnaireRes>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// `pending`, `filled` or `expired`
    pub status: Option<String>,
}

#[derive(Default, Serialize, Deserialize, ToSchema)]
pub struct IssueQuestionnaireReq {
    /// Upcoming appointment the questionnaire prepares for
    pub appointment_id: Option<i64>,
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_sms: bool,
}

#[derive(Default, Serialize, Deserialize, ToSchema)]
pub struct DispatchReq {
    #[serde(default)]
    pub send_email: bool,
    #[serde(default)]
    pub send_sms: bool,
}

fn outcome(o: ChannelOutcome) -> String {
    match o {
        ChannelOutcome::NotRequested => "not_requested",
        ChannelOutcome::Sent => "sent",
        ChannelOutcome::Failed => "failed",
        ChannelOutcome::MissingContact => "missing_contact",
    }
    .to_string()
}

/// Delivery result per channel: `not_requested`, `sent`, `failed` or `missing_contact`.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct DispatchRes {
    pub email: String,
    pub sms: String,
    /// Set when a requested channel did not deliver
    pub warning: Option<String>,
}

impl From<DispatchReport> for DispatchRes {
    fn from(report: DispatchReport) -> Self {
        Self {
            warning: report
                .has_problems()
                .then(|| "link was not delivered on every requested channel".to_string()),
            email: outcome(report.email),
            sms: outcome(report.sms),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct IssueQuestionnaireRes {
    pub questionnaire: QuestionnaireRes,
    pub link: String,
    pub dispatch: DispatchRes,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReminderRes {
    pub sms: String,
}

impl From<ChannelOutcome> for ReminderRes {
    fn from(o: ChannelOutcome) -> Self {
        Self { sms: outcome(o) }
    }
}

/// Patient-facing view of a questionnaire link.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct QuestionnaireFormRes {
    pub patient_name: String,
    /// `fillable` or `already_filled`
    pub availability: String,
    pub sent_at: String,
    pub expires_at: String,
    pub filled_at: Option<String>,
    /// Initial form values
    pub answers: AnswersDto,
}

impl QuestionnaireFormRes {
    pub fn new(view: QuestionnaireView, cfg: &CoreConfig) -> Self {
        let availability = match view.availability {
            Availability::Fillable => "fillable",
            Availability::AlreadyFilled => "already_filled",
            Availability::Expired => "expired",
        };
        Self {
            patient_name: view.patient_name.to_string(),
            availability: availability.to_string(),
            sent_at: instant(view.questionnaire.sent_at),
            expires_at: instant(cfg.expiry().expires_at(view.questionnaire.sent_at)),
            filled_at: view.questionnaire.filled_at.map(instant),
            answers: view.prefill.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SubmitRes {
    /// `submitted` or `already_submitted`
    pub outcome: String,
    pub message: String,
}
