//! HTTP handlers.
//!
//! Core services are synchronous (SQLite, blocking HTTP for notifications), so every call is
//! moved onto the blocking pool with [`blocking`].

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
};
use clinic_core::{
    ClinicError, ClinicResult, IssueRequest, NotifyVia, QuestionnaireAnswers, QuestionnaireStatus,
};

use crate::dto::*;
use crate::AppState;

/// Status and message returned for failed requests.
pub type ApiError = (StatusCode, String);

pub const LINK_INVALID: &str = "link invalid";
pub const LINK_EXPIRED: &str = "link expired, contact clinic";

fn internal() -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

/// Maps a core error to a response, logging anything that is not the caller's fault.
pub fn api_error(context: &str, e: ClinicError) -> ApiError {
    match e {
        ClinicError::QuestionnaireNotFound => (StatusCode::NOT_FOUND, LINK_INVALID.into()),
        ClinicError::PatientNotFound(_) => (StatusCode::NOT_FOUND, "Patient not found".into()),
        ClinicError::AppointmentNotFound(_) => {
            (StatusCode::NOT_FOUND, "Appointment not found".into())
        }
        ClinicError::Expired => (StatusCode::GONE, LINK_EXPIRED.into()),
        ClinicError::AlreadyFilled => (
            StatusCode::CONFLICT,
            "Questionnaire has already been submitted".into(),
        ),
        ClinicError::DuplicateCpf(_) => (StatusCode::CONFLICT, e.to_string()),
        ClinicError::InvalidInput(_) | ClinicError::Text(_) => {
            tracing::debug!("{context}: rejected input: {e}");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            tracing::error!("{context} error: {:?}", other);
            internal()
        }
    }
}

/// Runs a core call on the blocking thread pool.
async fn blocking<T, F>(f: F) -> Result<ClinicResult<T>, ApiError>
where
    F: FnOnce() -> ClinicResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("blocking task failed: {e}");
        internal()
    })
}

fn parse_status(raw: Option<String>) -> Result<Option<QuestionnaireStatus>, ApiError> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<QuestionnaireStatus>())
        .transpose()
        .map_err(|e| api_error("Parse status", e))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Clinic REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = CreatePatientReq,
    responses(
        (status = 201, description = "Patient registered", body = PatientRes),
        (status = 400, description = "Bad request"),
        (status = 409, description = "CPF already registered"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient
#[axum::debug_handler]
pub async fn create_patient(
    State(state): State<AppState>,
    Json(req): Json<CreatePatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError> {
    let new = req
        .into_new_patient()
        .map_err(|e| api_error("Create patient", e))?;

    let patients = state.patients.clone();
    let patient = blocking(move || patients.register(new))
        .await?
        .map_err(|e| api_error("Create patient", e))?;

    Ok((
        StatusCode::CREATED,
        Json(PatientRes::new(patient, state.today())),
    ))
}

#[utoipa::path(
    get,
    path = "/patients",
    params(PatientSearchQuery),
    responses(
        (status = 200, description = "Patients ordered by name", body = ListPatientsRes),
        (status = 500, description = "Internal server error")
    )
)]
/// List patients, optionally filtered by a name or CPF fragment
#[axum::debug_handler]
pub async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let patients = state.patients.clone();
    let found = blocking(move || patients.search(query.q.as_deref()))
        .await?
        .map_err(|e| api_error("List patients", e))?;

    let today = state.today();
    Ok(Json(ListPatientsRes {
        patients: found
            .into_iter()
            .map(|p| PatientRes::new(p, today))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Patient", body = PatientRes),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn get_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<PatientRes>, ApiError> {
    let patients = state.patients.clone();
    let patient = blocking(move || patients.get(id))
        .await?
        .map_err(|e| api_error("Get patient", e))?;

    Ok(Json(PatientRes::new(patient, state.today())))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/appointments",
    params(("id" = i64, Path, description = "Patient id")),
    request_body = CreateAppointmentReq,
    responses(
        (status = 201, description = "Appointment scheduled", body = AppointmentRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Schedule an appointment
#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<i64>,
    Json(req): Json<CreateAppointmentReq>,
) -> Result<(StatusCode, Json<AppointmentRes>), ApiError> {
    let new = req
        .into_new_appointment()
        .map_err(|e| api_error("Create appointment", e))?;

    let appointments = state.appointments.clone();
    let appointment = blocking(move || appointments.schedule(patient_id, new))
        .await?
        .map_err(|e| api_error("Create appointment", e))?;

    Ok((StatusCode::CREATED, Json(appointment.into())))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/appointments",
    params(("id" = i64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Upcoming scheduled appointments, soonest first", body = ListAppointmentsRes),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Upcoming appointments a questionnaire can be issued for
#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<i64>,
) -> Result<Json<ListAppointmentsRes>, ApiError> {
    let appointments = state.appointments.clone();
    let upcoming = blocking(move || appointments.upcoming_for_patient(patient_id))
        .await?
        .map_err(|e| api_error("List appointments", e))?;

    Ok(Json(ListAppointmentsRes {
        appointments: upcoming.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/appointments/{id}/reminder",
    params(("id" = i64, Path, description = "Appointment id")),
    responses(
        (status = 200, description = "Reminder dispatch result", body = ReminderRes),
        (status = 400, description = "Appointment is not scheduled"),
        (status = 404, description = "Appointment not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Send an SMS reminder for a scheduled appointment
#[axum::debug_handler]
pub async fn send_reminder(
    State(state): State<AppState>,
    AxumPath(appointment_id): AxumPath<i64>,
) -> Result<Json<ReminderRes>, ApiError> {
    let questionnaires = state.questionnaires.clone();
    let outcome = blocking(move || questionnaires.remind_appointment(appointment_id))
        .await?
        .map_err(|e| api_error("Send reminder", e))?;

    Ok(Json(outcome.into()))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/questionnaires",
    params(("id" = i64, Path, description = "Patient id")),
    request_body = IssueQuestionnaireReq,
    responses(
        (status = 201, description = "Questionnaire issued; check dispatch for delivery warnings", body = IssueQuestionnaireRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Patient or appointment not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Issue a questionnaire link for a patient
///
/// The questionnaire is stored before any email/SMS is attempted. Delivery failures are
/// reported in `dispatch` and do not fail the request.
#[axum::debug_handler]
pub async fn issue_questionnaire(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<i64>,
    Json(req): Json<IssueQuestionnaireReq>,
) -> Result<(StatusCode, Json<IssueQuestionnaireRes>), ApiError> {
    let request = IssueRequest {
        patient_id,
        appointment_id: req.appointment_id,
        notify: NotifyVia {
            email: req.send_email,
            sms: req.send_sms,
        },
    };

    let questionnaires = state.questionnaires.clone();
    let issued = blocking(move || questionnaires.issue(request))
        .await?
        .map_err(|e| api_error("Issue questionnaire", e))?;

    Ok((
        StatusCode::CREATED,
        Json(IssueQuestionnaireRes {
            questionnaire: QuestionnaireRes::new(issued.questionnaire, state.cfg()),
            link: issued.link,
            dispatch: issued.dispatch.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/patients/{id}/questionnaires",
    params(("id" = i64, Path, description = "Patient id"), StatusQuery),
    responses(
        (status = 200, description = "Patient's questionnaires, newest first", body = ListQuestionnairesRes),
        (status = 400, description = "Unknown status"),
        (status = 404, description = "Patient not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn list_patient_questionnaires(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<i64>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ListQuestionnairesRes>, ApiError> {
    let status = parse_status(query.status)?;
    let questionnaires = state.questionnaires.clone();
    let found = blocking(move || questionnaires.list_for_patient(patient_id, status))
        .await?
        .map_err(|e| api_error("List patient questionnaires", e))?;

    Ok(Json(ListQuestionnairesRes {
        questionnaires: found
            .into_iter()
            .map(|q| QuestionnaireRes::new(q, state.cfg()))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/questionnaires",
    params(StatusQuery),
    responses(
        (status = 200, description = "Questionnaires, newest first", body = ListQuestionnairesRes),
        (status = 400, description = "Unknown status"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn list_questionnaires(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ListQuestionnairesRes>, ApiError> {
    let status = parse_status(query.status)?;
    let questionnaires = state.questionnaires.clone();
    let found = blocking(move || questionnaires.list(status))
        .await?
        .map_err(|e| api_error("List questionnaires", e))?;

    Ok(Json(ListQuestionnairesRes {
        questionnaires: found
            .into_iter()
            .map(|q| QuestionnaireRes::new(q, state.cfg()))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/questionnaires/{id}",
    params(("id" = i64, Path, description = "Questionnaire id")),
    responses(
        (status = 200, description = "Questionnaire", body = QuestionnaireRes),
        (status = 404, description = "Questionnaire not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub async fn get_questionnaire(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> Result<Json<QuestionnaireRes>, ApiError> {
    let questionnaires = state.questionnaires.clone();
    let questionnaire = blocking(move || questionnaires.get(id))
        .await?
        .map_err(|e| api_error("Get questionnaire", e))?;

    Ok(Json(QuestionnaireRes::new(questionnaire, state.cfg())))
}

#[utoipa::path(
    post,
    path = "/questionnaires/{id}/dispatch",
    params(("id" = i64, Path, description = "Questionnaire id")),
    request_body = DispatchReq,
    responses(
        (status = 200, description = "Link re-sent; check dispatch for delivery warnings", body = IssueQuestionnaireRes),
        (status = 404, description = "Questionnaire not found"),
        (status = 409, description = "Questionnaire already submitted"),
        (status = 410, description = "Questionnaire link expired"),
        (status = 500, description = "Internal server error")
    )
)]
/// Re-send the link of a pending questionnaire
#[axum::debug_handler]
pub async fn dispatch_questionnaire(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<DispatchReq>,
) -> Result<Json<IssueQuestionnaireRes>, ApiError> {
    let notify = NotifyVia {
        email: req.send_email,
        sms: req.send_sms,
    };

    let questionnaires = state.questionnaires.clone();
    let sent = blocking(move || questionnaires.dispatch(id, notify))
        .await?
        .map_err(|e| api_error("Dispatch questionnaire", e))?;

    Ok(Json(IssueQuestionnaireRes {
        questionnaire: QuestionnaireRes::new(sent.questionnaire, state.cfg()),
        link: sent.link,
        dispatch: sent.dispatch.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/q/{token}",
    params(("token" = String, Path, description = "Questionnaire access token")),
    responses(
        (status = 200, description = "Questionnaire form, fillable or already submitted", body = QuestionnaireFormRes),
        (status = 404, description = "link invalid"),
        (status = 410, description = "link expired, contact clinic"),
        (status = 500, description = "Internal server error")
    )
)]
/// Patient-facing: open a questionnaire link
#[axum::debug_handler]
pub async fn open_questionnaire(
    State(state): State<AppState>,
    AxumPath(token): AxumPath<String>,
) -> Result<Json<QuestionnaireFormRes>, ApiError> {
    let questionnaires = state.questionnaires.clone();
    let view = blocking(move || questionnaires.open(&token))
        .await?
        .map_err(|e| api_error("Open questionnaire", e))?;

    if view.questionnaire.status == QuestionnaireStatus::Expired {
        return Err(api_error("Open questionnaire", ClinicError::Expired));
    }

    Ok(Json(QuestionnaireFormRes::new(view, state.cfg())))
}

#[utoipa::path(
    post,
    path = "/q/{token}",
    params(("token" = String, Path, description = "Questionnaire access token")),
    request_body = AnswersDto,
    responses(
        (status = 200, description = "Answers recorded, or the questionnaire was already submitted", body = SubmitRes),
        (status = 404, description = "link invalid"),
        (status = 410, description = "link expired, contact clinic"),
        (status = 500, description = "Internal server error")
    )
)]
/// Patient-facing: submit answers
///
/// Re-submitting a filled questionnaire is not an error: the response carries
/// `outcome = "already_submitted"` and nothing is changed.
#[axum::debug_handler]
pub async fn submit_questionnaire(
    State(state): State<AppState>,
    AxumPath(token): AxumPath<String>,
    Json(req): Json<AnswersDto>,
) -> Result<Json<SubmitRes>, ApiError> {
    let answers = QuestionnaireAnswers::from(req);
    let questionnaires = state.questionnaires.clone();

    match blocking(move || questionnaires.submit(&token, answers)).await? {
        Ok(_) => Ok(Json(SubmitRes {
            outcome: "submitted".into(),
            message: "Thank you, your answers were recorded.".into(),
        })),
        Err(ClinicError::AlreadyFilled) => Ok(Json(SubmitRes {
            outcome: "already_submitted".into(),
            message: "This questionnaire has already been submitted.".into(),
        })),
        Err(e) => Err(api_error("Submit questionnaire", e)),
    }
}
