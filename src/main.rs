use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};

/// Main entry point for the clinic application
///
/// Loads `.env`, opens the database, runs pending migrations and serves the REST API (with
/// Swagger UI at `/swagger-ui`) until interrupted.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATABASE_PATH`: SQLite file (default: "clinic_data/clinic.db")
/// - `CLINIC_PUBLIC_BASE_URL`: origin patients open questionnaire links on
/// - `QUESTIONNAIRE_EXPIRY_DAYS`, `DEFAULT_COUNTRY_CODE`, `CLINIC_NAME`
/// - `SENDGRID_API_KEY`, `FROM_EMAIL`, `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`,
///   `TWILIO_PHONE_NUMBER`: notification providers; unset means links are only shown to staff
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting clinic REST on {}", rest_addr);

    let state = AppState::from_env()?;
    tracing::info!(
        database = %state.cfg().database_path().display(),
        base_url = state.cfg().public_base_url(),
        expiry_days = state.cfg().expiry().whole_days(),
        "configuration loaded"
    );

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- clinic REST stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
