//! # Questionnaire Workflow
//!
//! Issues pre-visit questionnaire links, serves them to patients, and records submissions.
//!
//! ## Guarantees
//!
//! - A questionnaire row is committed before any notification is attempted, so a provider
//!   failure never loses an issued link.
//! - Every access evaluates the expiry window and persists `pending -> expired` before
//!   returning; callers never observe a stale fillable link.
//! - Submission writes the answers and the patient's medical history in one transaction, and
//!   the status change is conditional on the row still being `pending`. Of two concurrent
//!   submissions exactly one wins; the other gets [`ClinicError::AlreadyFilled`].

use crate::appointment::AppointmentStatus;
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::constants::TOKEN_INSERT_ATTEMPTS;
use crate::db::Database;
use crate::notifications::{messages, to_e164, NotificationService};
use crate::patient::{MedicalHistory, Patient};
use crate::questionnaire::{
    Availability, NewQuestionnaire, Questionnaire, QuestionnaireAnswers, QuestionnaireFilter,
    QuestionnaireStatus,
};
use crate::repositories::{appointments, patients, questionnaires};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_token::AccessToken;
use clinic_types::NonEmptyText;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Channels a link should be sent over.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyVia {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub sms: bool,
}

impl NotifyVia {
    pub const NONE: NotifyVia = NotifyVia {
        email: false,
        sms: false,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssueRequest {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub notify: NotifyVia,
}

/// Result of one delivery channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOutcome {
    NotRequested,
    Sent,
    Failed,
    /// The patient has no email address / usable phone number on file.
    MissingContact,
}

impl ChannelOutcome {
    fn from_sent(sent: bool) -> Self {
        if sent {
            ChannelOutcome::Sent
        } else {
            ChannelOutcome::Failed
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self, ChannelOutcome::Failed | ChannelOutcome::MissingContact)
    }
}

/// Per-channel delivery report shown to staff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
}

impl DispatchReport {
    pub fn has_problems(&self) -> bool {
        self.email.is_problem() || self.sms.is_problem()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issued {
    pub questionnaire: Questionnaire,
    pub link: String,
    pub dispatch: DispatchReport,
}

/// What the patient-facing page renders for a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionnaireView {
    pub questionnaire: Questionnaire,
    pub patient_name: NonEmptyText,
    pub availability: Availability,
    /// Initial form values. For a fillable link these come from the patient's record; otherwise
    /// they are the answers already stored on the questionnaire.
    pub prefill: QuestionnaireAnswers,
}

#[derive(Clone)]
pub struct QuestionnaireService {
    cfg: Arc<CoreConfig>,
    db: Arc<Database>,
    notifier: Arc<dyn NotificationService>,
    clock: Arc<dyn Clock>,
}

impl QuestionnaireService {
    pub fn new(
        cfg: Arc<CoreConfig>,
        db: Arc<Database>,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            cfg,
            db,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates a pending questionnaire with a fresh token, then sends the link.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::PatientNotFound` / `AppointmentNotFound` for unknown ids and
    /// `ClinicError::InvalidInput` if the appointment belongs to another patient or is no
    /// longer scheduled. Notification problems are not errors; see [`Issued::dispatch`].
    pub fn issue(&self, request: IssueRequest) -> ClinicResult<Issued> {
        let now = self.clock.now();

        let (questionnaire, patient) = self.db.with_transaction(|tx| {
            let patient = patients::get_patient(tx, request.patient_id)?
                .ok_or(ClinicError::PatientNotFound(request.patient_id))?;

            if let Some(appointment_id) = request.appointment_id {
                let appointment = appointments::get_appointment(tx, appointment_id)?
                    .ok_or(ClinicError::AppointmentNotFound(appointment_id))?;
                if appointment.patient_id != patient.id {
                    return Err(ClinicError::InvalidInput(format!(
                        "appointment {appointment_id} belongs to another patient"
                    )));
                }
                if appointment.status != AppointmentStatus::Scheduled {
                    return Err(ClinicError::InvalidInput(format!(
                        "appointment {appointment_id} is {}",
                        appointment.status
                    )));
                }
            }

            let questionnaire =
                insert_with_fresh_token(tx, patient.id, request.appointment_id, now)?;
            Ok((questionnaire, patient))
        })?;

        tracing::info!(
            questionnaire_id = questionnaire.id,
            patient_id = patient.id,
            "questionnaire issued"
        );

        let link = self.cfg.questionnaire_link(&questionnaire.token);
        let dispatch = self.send_link(&patient, &link, request.notify);

        Ok(Issued {
            questionnaire,
            link,
            dispatch,
        })
    }

    /// Resolves a patient-facing token.
    ///
    /// Filled and expired questionnaires are returned normally with the matching
    /// [`Availability`]. Unknown or malformed tokens are `QuestionnaireNotFound`.
    pub fn open(&self, token: &str) -> ClinicResult<QuestionnaireView> {
        let token = parse_token(token)?;
        let now = self.clock.now();

        let (questionnaire, patient) = self.db.with_transaction(|tx| {
            let questionnaire = questionnaires::get_questionnaire_by_token(tx, &token)?
                .ok_or(ClinicError::QuestionnaireNotFound)?;
            let questionnaire = self.refresh(tx, questionnaire, now)?;
            let patient = patients::get_patient(tx, questionnaire.patient_id)?
                .ok_or(ClinicError::PatientNotFound(questionnaire.patient_id))?;
            Ok((questionnaire, patient))
        })?;

        let availability = questionnaire.availability();
        let prefill = match availability {
            Availability::Fillable => QuestionnaireAnswers {
                medical_history: patient.diseases,
                current_medications: patient.medications,
                allergies: patient.allergies,
                ..QuestionnaireAnswers::default()
            },
            Availability::AlreadyFilled | Availability::Expired => questionnaire.answers.clone(),
        };

        Ok(QuestionnaireView {
            questionnaire,
            patient_name: patient.name,
            availability,
            prefill,
        })
    }

    /// Staff lookup by id, with the same expiry evaluation as [`open`](Self::open).
    pub fn get(&self, id: i64) -> ClinicResult<Questionnaire> {
        let now = self.clock.now();
        self.db.with_transaction(|tx| {
            let questionnaire = questionnaires::get_questionnaire(tx, id)?
                .ok_or(ClinicError::QuestionnaireNotFound)?;
            self.refresh(tx, questionnaire, now)
        })
    }

    /// All questionnaires, optionally by status, newest first.
    pub fn list(&self, status: Option<QuestionnaireStatus>) -> ClinicResult<Vec<Questionnaire>> {
        self.list_filtered(QuestionnaireFilter {
            status,
            patient_id: None,
        })
    }

    /// One patient's questionnaires, optionally by status, newest first.
    pub fn list_for_patient(
        &self,
        patient_id: i64,
        status: Option<QuestionnaireStatus>,
    ) -> ClinicResult<Vec<Questionnaire>> {
        self.list_filtered(QuestionnaireFilter {
            status,
            patient_id: Some(patient_id),
        })
    }

    fn list_filtered(&self, filter: QuestionnaireFilter) -> ClinicResult<Vec<Questionnaire>> {
        let cutoff = self.cfg.expiry().cutoff(self.clock.now());
        self.db.with_transaction(|tx| {
            if let Some(patient_id) = filter.patient_id {
                if !patients::patient_exists(tx, patient_id)? {
                    return Err(ClinicError::PatientNotFound(patient_id));
                }
            }

            let expired = questionnaires::expire_overdue(tx, cutoff)?;
            if expired > 0 {
                tracing::info!(count = expired, "expired overdue questionnaires");
            }
            questionnaires::list_questionnaires(tx, &filter)
        })
    }

    /// Records a patient's answers and copies the medical history onto their record.
    ///
    /// # Errors
    ///
    /// - `QuestionnaireNotFound` for an unknown or malformed token.
    /// - `Expired` if the link is past its window (the expiry is persisted).
    /// - `AlreadyFilled` if the questionnaire was already submitted, including when a
    ///   concurrent submission won the race. Nothing is written in that case.
    pub fn submit(&self, token: &str, answers: QuestionnaireAnswers) -> ClinicResult<Questionnaire> {
        let token = parse_token(token)?;
        let answers = answers.normalised();
        let now = self.clock.now();

        // Rejections are returned as the inner result so the transaction still commits a lazy
        // expiry that was applied on the way.
        let outcome = self.db.with_transaction(|tx| {
            let questionnaire = questionnaires::get_questionnaire_by_token(tx, &token)?
                .ok_or(ClinicError::QuestionnaireNotFound)?;
            let questionnaire = self.refresh(tx, questionnaire, now)?;
            if let Err(rejected) = questionnaire.ensure_fillable() {
                return Ok(Err(rejected));
            }

            if !questionnaires::mark_filled(tx, questionnaire.id, &answers, now)? {
                return Ok(Err(ClinicError::AlreadyFilled));
            }

            let history = MedicalHistory {
                diseases: answers.medical_history.clone(),
                medications: answers.current_medications.clone(),
                allergies: answers.allergies.clone(),
            };
            if !patients::update_medical_history(tx, questionnaire.patient_id, &history)? {
                return Err(ClinicError::PatientNotFound(questionnaire.patient_id));
            }

            let filled = questionnaires::get_questionnaire(tx, questionnaire.id)?
                .ok_or(ClinicError::QuestionnaireNotFound)?;
            Ok(Ok(filled))
        })?;

        match &outcome {
            Ok(filled) => tracing::info!(
                questionnaire_id = filled.id,
                patient_id = filled.patient_id,
                "questionnaire submitted"
            ),
            Err(e) => tracing::info!("questionnaire submission rejected: {e}"),
        }
        outcome
    }

    /// Sends the link of a pending questionnaire again.
    pub fn dispatch(&self, id: i64, notify: NotifyVia) -> ClinicResult<Issued> {
        let now = self.clock.now();
        let (questionnaire, patient) = self.db.with_transaction(|tx| {
            let questionnaire = questionnaires::get_questionnaire(tx, id)?
                .ok_or(ClinicError::QuestionnaireNotFound)?;
            let questionnaire = self.refresh(tx, questionnaire, now)?;
            let patient = patients::get_patient(tx, questionnaire.patient_id)?
                .ok_or(ClinicError::PatientNotFound(questionnaire.patient_id))?;
            Ok((questionnaire, patient))
        })?;
        questionnaire.ensure_fillable()?;

        let link = self.cfg.questionnaire_link(&questionnaire.token);
        let dispatch = self.send_link(&patient, &link, notify);
        tracing::info!(questionnaire_id = id, "questionnaire link re-sent");

        Ok(Issued {
            questionnaire,
            link,
            dispatch,
        })
    }

    /// Sends an SMS reminder for a scheduled appointment.
    pub fn remind_appointment(&self, appointment_id: i64) -> ClinicResult<ChannelOutcome> {
        let (appointment, patient) = self.db.with_conn(|conn| {
            let appointment = appointments::get_appointment(conn, appointment_id)?
                .ok_or(ClinicError::AppointmentNotFound(appointment_id))?;
            let patient = patients::get_patient(conn, appointment.patient_id)?
                .ok_or(ClinicError::PatientNotFound(appointment.patient_id))?;
            Ok((appointment, patient))
        })?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(ClinicError::InvalidInput(format!(
                "appointment {appointment_id} is {}",
                appointment.status
            )));
        }

        let Some(phone) = self.patient_phone(&patient) else {
            tracing::warn!(patient_id = patient.id, "no usable phone number, reminder not sent");
            return Ok(ChannelOutcome::MissingContact);
        };

        let body = messages::appointment_reminder_sms(
            self.cfg.clinic_name().as_str(),
            patient.name.as_str(),
            &appointment,
        );
        let outcome = ChannelOutcome::from_sent(self.notifier.send_sms(&phone, &body));
        if outcome.is_problem() {
            tracing::warn!(appointment_id, "appointment reminder not delivered");
        }
        Ok(outcome)
    }

    /// Persists `pending -> expired` if the window has passed, returning the current record.
    fn refresh(
        &self,
        conn: &Connection,
        questionnaire: Questionnaire,
        now: DateTime<Utc>,
    ) -> ClinicResult<Questionnaire> {
        let policy = self.cfg.expiry();
        if policy.status_on_access(questionnaire.status, questionnaire.sent_at, now)
            == questionnaire.status
        {
            return Ok(questionnaire);
        }

        if questionnaires::expire_if_overdue(conn, questionnaire.id, policy.cutoff(now))? {
            tracing::info!(questionnaire_id = questionnaire.id, "questionnaire expired");
        }
        questionnaires::get_questionnaire(conn, questionnaire.id)?
            .ok_or(ClinicError::QuestionnaireNotFound)
    }

    fn patient_phone(&self, patient: &Patient) -> Option<String> {
        patient
            .phone
            .as_deref()
            .and_then(|p| to_e164(p, self.cfg.default_country_code()))
    }

    fn send_link(&self, patient: &Patient, link: &str, notify: NotifyVia) -> DispatchReport {
        let clinic = self.cfg.clinic_name().as_str();
        let days = self.cfg.expiry().whole_days();

        let email = match (notify.email, patient.email.as_ref()) {
            (false, _) => ChannelOutcome::NotRequested,
            (true, None) => ChannelOutcome::MissingContact,
            (true, Some(address)) => {
                let msg = messages::questionnaire_email(clinic, patient.name.as_str(), link, days);
                ChannelOutcome::from_sent(self.notifier.send_email(
                    address,
                    &msg.subject,
                    &msg.html,
                    &msg.text,
                ))
            }
        };

        let sms = match (notify.sms, self.patient_phone(patient)) {
            (false, _) => ChannelOutcome::NotRequested,
            (true, None) => ChannelOutcome::MissingContact,
            (true, Some(phone)) => {
                let body = messages::questionnaire_sms(clinic, patient.name.as_str(), link, days);
                ChannelOutcome::from_sent(self.notifier.send_sms(&phone, &body))
            }
        };

        let report = DispatchReport { email, sms };
        if report.has_problems() {
            tracing::warn!(
                patient_id = patient.id,
                email = ?report.email,
                sms = ?report.sms,
                "questionnaire link not delivered on every requested channel"
            );
        }
        report
    }
}

fn parse_token(raw: &str) -> ClinicResult<AccessToken> {
    AccessToken::parse(raw.trim()).map_err(|_| ClinicError::QuestionnaireNotFound)
}

fn insert_with_fresh_token(
    conn: &Connection,
    patient_id: i64,
    appointment_id: Option<i64>,
    sent_at: DateTime<Utc>,
) -> ClinicResult<Questionnaire> {
    for attempt in 1..=TOKEN_INSERT_ATTEMPTS {
        let new = NewQuestionnaire {
            patient_id,
            appointment_id,
            token: AccessToken::generate(),
            sent_at,
        };
        match questionnaires::insert_questionnaire(conn, &new) {
            Err(ClinicError::DuplicateToken) => {
                tracing::warn!(attempt, "token collision, regenerating");
            }
            other => return other,
        }
    }
    Err(ClinicError::DuplicateToken)
}
