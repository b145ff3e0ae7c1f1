//! # API REST
//!
//! REST API for the clinic questionnaire workflow.
//!
//! Handles:
//! - HTTP endpoints with axum (staff routes and the patient-facing `/q/{token}` link)
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status-code mapping)
//!
//! Business rules live in `clinic-core`; this crate only translates HTTP to service calls.

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use clinic_core::{
    config::{country_code_from_env_value, expiry_days_from_env_value},
    constants::{DEFAULT_CLINIC_NAME, DEFAULT_DATABASE_PATH},
    AppointmentService, Clock, CoreConfig, Database, DisabledNotificationService,
    HttpNotificationService, NonEmptyText, NotificationConfig, NotificationService,
    PatientService, QuestionnaireService, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::*;

/// Application state shared across REST API handlers
///
/// Holds the core services, each built once at startup over the same database handle.
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    patients: PatientService,
    appointments: AppointmentService,
    questionnaires: QuestionnaireService,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        cfg: Arc<CoreConfig>,
        db: Arc<Database>,
        notifier: Arc<dyn NotificationService>,
    ) -> Self {
        Self {
            patients: PatientService::new(db.clone()),
            appointments: AppointmentService::new(db.clone()),
            questionnaires: QuestionnaireService::new(cfg.clone(), db, notifier),
            cfg,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source of every service.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self {
            patients: self.patients.with_clock(clock.clone()),
            appointments: self.appointments.with_clock(clock.clone()),
            questionnaires: self.questionnaires.with_clock(clock.clone()),
            cfg: self.cfg,
            clock,
        }
    }

    /// Builds the state from process environment variables.
    ///
    /// # Environment Variables
    /// - `CLINIC_DATABASE_PATH`: SQLite file (default: `clinic_data/clinic.db`)
    /// - `CLINIC_PUBLIC_BASE_URL`: origin used in patient links (default: `http://localhost:3000`)
    /// - `CLINIC_NAME`: name used in outgoing messages
    /// - `QUESTIONNAIRE_EXPIRY_DAYS`: link validity (default: 7)
    /// - `DEFAULT_COUNTRY_CODE`: prefix for national phone numbers (default: 55)
    /// - `SENDGRID_API_KEY`, `FROM_EMAIL`: email delivery
    /// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER`: SMS delivery
    ///
    /// # Errors
    /// Returns an error if a value is malformed or the database cannot be opened.
    pub fn from_env() -> anyhow::Result<Self> {
        let env = |key: &str| std::env::var(key).ok();

        let database_path = env("CLINIC_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
        let public_base_url =
            env("CLINIC_PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".into());
        let clinic_name = NonEmptyText::new(
            env("CLINIC_NAME").unwrap_or_else(|| DEFAULT_CLINIC_NAME.into()),
        )?;
        let expiry_days = expiry_days_from_env_value(env("QUESTIONNAIRE_EXPIRY_DAYS"))?;
        let country_code = country_code_from_env_value(env("DEFAULT_COUNTRY_CODE"));

        let cfg = Arc::new(CoreConfig::new(
            database_path,
            &public_base_url,
            expiry_days,
            &country_code,
            clinic_name,
        )?);
        let db = Arc::new(Database::open(cfg.database_path())?);

        let notifications = NotificationConfig::new(
            env("SENDGRID_API_KEY"),
            env("FROM_EMAIL"),
            env("TWILIO_ACCOUNT_SID"),
            env("TWILIO_AUTH_TOKEN"),
            env("TWILIO_PHONE_NUMBER"),
        );
        tracing::info!(
            email = notifications.email_enabled(),
            sms = notifications.sms_enabled(),
            "notification providers"
        );
        let notifier: Arc<dyn NotificationService> =
            if notifications.email_enabled() || notifications.sms_enabled() {
                Arc::new(HttpNotificationService::new(notifications))
            } else {
                Arc::new(DisabledNotificationService)
            };

        Ok(Self::new(cfg, db, notifier))
    }

    pub fn cfg(&self) -> &CoreConfig {
        &self.cfg
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::create_patient,
        handlers::list_patients,
        handlers::get_patient,
        handlers::create_appointment,
        handlers::list_appointments,
        handlers::send_reminder,
        handlers::issue_questionnaire,
        handlers::list_patient_questionnaires,
        handlers::list_questionnaires,
        handlers::get_questionnaire,
        handlers::dispatch_questionnaire,
        handlers::open_questionnaire,
        handlers::submit_questionnaire,
    ),
    components(schemas(
        HealthRes,
        CreatePatientReq,
        PatientRes,
        ListPatientsRes,
        CreateAppointmentReq,
        AppointmentRes,
        ListAppointmentsRes,
        ReminderRes,
        AnswersDto,
        IssueQuestionnaireReq,
        IssueQuestionnaireRes,
        DispatchReq,
        DispatchRes,
        QuestionnaireRes,
        ListQuestionnairesRes,
        QuestionnaireFormRes,
        SubmitRes,
    ))
)]
pub struct ApiDoc;

/// Builds the router with every route, Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/patients",
            get(handlers::list_patients).post(handlers::create_patient),
        )
        .route("/patients/:id", get(handlers::get_patient))
        .route(
            "/patients/:id/appointments",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route(
            "/patients/:id/questionnaires",
            get(handlers::list_patient_questionnaires).post(handlers::issue_questionnaire),
        )
        .route("/appointments/:id/reminder", post(handlers::send_reminder))
        .route("/questionnaires", get(handlers::list_questionnaires))
        .route("/questionnaires/:id", get(handlers::get_questionnaire))
        .route(
            "/questionnaires/:id/dispatch",
            post(handlers::dispatch_questionnaire),
        )
        .route(
            "/q/:token",
            get(handlers::open_questionnaire).post(handlers::submit_questionnaire),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, TimeZone, Utc};
    use clinic_core::ManualClock;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        state: AppState,
        clock: Arc<ManualClock>,
    }

    fn test_app() -> TestApp {
        let cfg = Arc::new(
            CoreConfig::new(
                PathBuf::from("unused.db"),
                "https://clinic.example",
                7,
                "55",
                NonEmptyText::new("Sorriso").unwrap(),
            )
            .unwrap(),
        );
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap(),
        ));
        let state = AppState::new(cfg, db, Arc::new(DisabledNotificationService))
            .with_clock(clock.clone());
        TestApp { state, clock }
    }

    async fn send(app: &TestApp, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router(app.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    async fn create_patient(app: &TestApp) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/patients",
            Some(json!({
                "name": "Ana Lima",
                "birth_date": "1990-06-15",
                "email": "ana@example.com",
                "cpf": "123.456.789-09",
                "allergies": "latex"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }

    async fn issue(app: &TestApp, patient_id: i64, body: Value) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            &format!("/patients/{patient_id}/questionnaires"),
            Some(body),
        )
        .await
    }

    fn token_of(issued: &Value) -> String {
        let link = issued["link"].as_str().unwrap();
        link.rsplit('/').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_alive() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn patient_round_trip_and_validation() {
        let app = test_app();
        let id = create_patient(&app).await;

        let (status, body) = send(&app, "GET", &format!("/patients/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cpf"], "123.456.789-09");
        assert_eq!(body["age"], 35);

        let (status, _) = send(&app, "POST", "/patients", Some(json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/patients",
            Some(json!({ "name": "Other", "cpf": "12345678909" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(&app, "GET", "/patients/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn issue_open_and_submit_flow() {
        let app = test_app();
        let patient_id = create_patient(&app).await;

        let (status, issued) = issue(&app, patient_id, json!({ "send_email": true })).await;
        assert_eq!(status, StatusCode::CREATED, "{issued}");
        assert_eq!(issued["questionnaire"]["status"], "pending");
        assert_eq!(issued["dispatch"]["email"], "failed");
        assert!(issued["dispatch"]["warning"].is_string());
        let token = token_of(&issued);
        assert!(issued["link"]
            .as_str()
            .unwrap()
            .starts_with("https://clinic.example/q/"));

        let (status, form) = send(&app, "GET", &format!("/q/{token}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(form["availability"], "fillable");
        assert_eq!(form["patient_name"], "Ana Lima");
        assert_eq!(form["answers"]["allergies"], "latex");

        let answers = json!({
            "medical_history": "hypertension",
            "current_medications": "losartan",
            "allergies": "penicillin",
            "complaints": "bleeding gums"
        });
        let (status, body) = send(&app, "POST", &format!("/q/{token}"), Some(answers.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "submitted");

        let (status, body) = send(&app, "POST", &format!("/q/{token}"), Some(answers)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_submitted");

        let (_, patient) = send(&app, "GET", &format!("/patients/{patient_id}"), None).await;
        assert_eq!(patient["diseases"], "hypertension");
        assert_eq!(patient["medications"], "losartan");
        assert_eq!(patient["allergies"], "penicillin");

        let (status, form) = send(&app, "GET", &format!("/q/{token}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(form["availability"], "already_filled");
        assert_eq!(form["answers"]["complaints"], "bleeding gums");
    }

    #[tokio::test]
    async fn unknown_token_is_link_invalid() {
        let app = test_app();
        let (status, body) = send(&app, "GET", "/q/does-not-exist", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, Value::String("link invalid".into()));

        let (status, _) = send(&app, "POST", "/q/does-not-exist", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expired_link_is_gone() {
        let app = test_app();
        let patient_id = create_patient(&app).await;
        let (_, issued) = issue(&app, patient_id, json!({})).await;
        let token = token_of(&issued);

        app.clock.advance(Duration::days(8));

        let (status, body) = send(&app, "GET", &format!("/q/{token}"), None).await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, Value::String("link expired, contact clinic".into()));

        let (status, _) = send(&app, "POST", &format!("/q/{token}"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::GONE);

        let (status, list) = send(&app, "GET", "/questionnaires?status=expired", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list["questionnaires"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_rejects_unknown_status() {
        let app = test_app();
        let (status, _) = send(&app, "GET", "/questionnaires?status=preenchido", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn appointments_and_reminders() {
        let app = test_app();
        let patient_id = create_patient(&app).await;

        let (status, appt) = send(
            &app,
            "POST",
            &format!("/patients/{patient_id}/appointments"),
            Some(json!({ "date": "2026-05-11", "time": "9:30", "kind": "Cleaning" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{appt}");
        assert_eq!(appt["label"], "11/05/2026 - 09:30 - Cleaning");
        let appointment_id = appt["id"].as_i64().unwrap();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{patient_id}/appointments"),
            Some(json!({ "date": "2026-05-11", "time": "25:00", "kind": "Cleaning" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, upcoming) = send(
            &app,
            "GET",
            &format!("/patients/{patient_id}/appointments"),
            None,
        )
        .await;
        assert_eq!(upcoming["appointments"].as_array().unwrap().len(), 1);

        let (status, issued) = issue(
            &app,
            patient_id,
            json!({ "appointment_id": appointment_id }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(issued["questionnaire"]["appointment_id"], appointment_id);

        // No phone on file.
        let (status, body) = send(
            &app,
            "POST",
            &format!("/appointments/{appointment_id}/reminder"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sms"], "missing_contact");
    }

    #[tokio::test]
    async fn dispatch_refuses_filled_questionnaire() {
        let app = test_app();
        let patient_id = create_patient(&app).await;
        let (_, issued) = issue(&app, patient_id, json!({})).await;
        let id = issued["questionnaire"]["id"].as_i64().unwrap();
        let token = token_of(&issued);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/questionnaires/{id}/dispatch"),
            Some(json!({ "send_sms": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dispatch"]["sms"], "missing_contact");

        send(&app, "POST", &format!("/q/{token}"), Some(json!({}))).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/questionnaires/{id}/dispatch"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
