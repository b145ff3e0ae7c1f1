use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use clinic_core::{
    config::{country_code_from_env_value, expiry_days_from_env_value},
    constants::{DEFAULT_CLINIC_NAME, DEFAULT_DATABASE_PATH},
    notifications::NotificationConfig,
    AppointmentService, Availability, ClinicError, CoreConfig, Cpf, Database, EmailAddress,
    HttpNotificationService, IssueRequest, NewAppointment, NewPatient, NonEmptyText, NotifyVia,
    PatientService, Questionnaire, QuestionnaireAnswers, QuestionnaireService,
    QuestionnaireStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic pre-visit questionnaire CLI")]
struct Cli {
    /// SQLite database file (overrides CLINIC_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a patient
    AddPatient {
        /// Full name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// CPF, with or without punctuation
        #[arg(long)]
        cpf: Option<String>,
        #[arg(long)]
        allergies: Option<String>,
    },
    /// List patients, optionally filtered by name or CPF fragment
    ListPatients {
        query: Option<String>,
    },
    /// Schedule an appointment
    AddAppointment {
        patient_id: i64,
        /// Date (YYYY-MM-DD)
        date: String,
        /// Time (HH:MM)
        time: String,
        /// Appointment type, e.g. "Cleaning"
        kind: String,
    },
    /// Issue a questionnaire link for a patient
    Issue {
        patient_id: i64,
        /// Upcoming appointment the questionnaire prepares for
        #[arg(long)]
        appointment: Option<i64>,
        /// Send the link by email
        #[arg(long)]
        email: bool,
        /// Send the link by SMS
        #[arg(long)]
        sms: bool,
    },
    /// List questionnaires
    List {
        /// pending, filled or expired
        #[arg(long)]
        status: Option<String>,
        /// Only this patient's questionnaires
        #[arg(long)]
        patient: Option<i64>,
    },
    /// Show one questionnaire
    Show {
        id: i64,
    },
    /// Open a questionnaire link as the patient would
    Open {
        token: String,
    },
    /// Submit answers for a questionnaire link
    Submit {
        token: String,
        #[arg(long)]
        medical_history: Option<String>,
        #[arg(long)]
        complaints: Option<String>,
        #[arg(long)]
        current_medications: Option<String>,
        #[arg(long)]
        allergies: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Send an SMS reminder for an appointment
    Remind {
        appointment_id: i64,
    },
}

struct Services {
    patients: PatientService,
    appointments: AppointmentService,
    questionnaires: QuestionnaireService,
}

fn build_services(database: Option<PathBuf>) -> Result<Services, Box<dyn std::error::Error>> {
    let env = |key: &str| std::env::var(key).ok();

    let database_path = database
        .or_else(|| env("CLINIC_DATABASE_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    let cfg = Arc::new(CoreConfig::new(
        database_path,
        &env("CLINIC_PUBLIC_BASE_URL").unwrap_or_else(|| "http://localhost:3000".into()),
        expiry_days_from_env_value(env("QUESTIONNAIRE_EXPIRY_DAYS"))?,
        &country_code_from_env_value(env("DEFAULT_COUNTRY_CODE")),
        NonEmptyText::new(env("CLINIC_NAME").unwrap_or_else(|| DEFAULT_CLINIC_NAME.into()))?,
    )?);
    let db = Arc::new(Database::open(cfg.database_path())?);
    let notifier = Arc::new(HttpNotificationService::new(NotificationConfig::new(
        env("SENDGRID_API_KEY"),
        env("FROM_EMAIL"),
        env("TWILIO_ACCOUNT_SID"),
        env("TWILIO_AUTH_TOKEN"),
        env("TWILIO_PHONE_NUMBER"),
    )));

    Ok(Services {
        patients: PatientService::new(db.clone()),
        appointments: AppointmentService::new(db.clone()),
        questionnaires: QuestionnaireService::new(cfg, db, notifier),
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, ClinicError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ClinicError::InvalidInput(format!("expected YYYY-MM-DD, got '{raw}'")))
}

fn print_questionnaire(q: &Questionnaire) {
    println!(
        "ID: {}, Patient: {}, Status: {}, Sent: {}, Filled: {}",
        q.id,
        q.patient_id,
        q.status,
        q.sent_at.format("%d/%m/%Y %H:%M"),
        q.filled_at
            .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "-".into())
    );
}

fn print_answer(label: &str, value: &Option<String>) {
    println!("  {label}: {}", value.as_deref().unwrap_or("-"));
}

fn print_answers(answers: &QuestionnaireAnswers) {
    print_answer("Medical history", &answers.medical_history);
    print_answer("Complaints", &answers.complaints);
    print_answer("Current medications", &answers.current_medications);
    print_answer("Allergies", &answers.allergies);
    print_answer("Notes", &answers.notes);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };
    let services = build_services(cli.database)?;

    match command {
        Commands::AddPatient {
            name,
            birth_date,
            phone,
            email,
            cpf,
            allergies,
        } => {
            let mut new = NewPatient::named(NonEmptyText::new(&name)?);
            new.birth_date = birth_date.as_deref().map(parse_date).transpose()?;
            new.phone = phone;
            new.email = email.map(EmailAddress::parse).transpose()?;
            new.cpf = cpf.map(Cpf::parse).transpose()?;
            new.allergies = allergies;
            match services.patients.register(new) {
                Ok(patient) => println!("Registered patient with ID: {}", patient.id),
                Err(e) => eprintln!("Error registering patient: {}", e),
            }
        }
        Commands::ListPatients { query } => {
            let patients = services.patients.search(query.as_deref())?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "ID: {}, Name: {}, CPF: {}, Phone: {}",
                        patient.id,
                        patient.name,
                        patient.cpf.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
                        patient.phone.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Commands::AddAppointment {
            patient_id,
            date,
            time,
            kind,
        } => {
            let new = NewAppointment {
                date: parse_date(&date)?,
                time: time.parse()?,
                kind: NonEmptyText::new(&kind)?,
                notes: None,
            };
            match services.appointments.schedule(patient_id, new) {
                Ok(appointment) => println!(
                    "Scheduled appointment {}: {}",
                    appointment.id,
                    appointment.label()
                ),
                Err(e) => eprintln!("Error scheduling appointment: {}", e),
            }
        }
        Commands::Issue {
            patient_id,
            appointment,
            email,
            sms,
        } => {
            let request = IssueRequest {
                patient_id,
                appointment_id: appointment,
                notify: NotifyVia { email, sms },
            };
            match services.questionnaires.issue(request) {
                Ok(issued) => {
                    println!("Issued questionnaire {}", issued.questionnaire.id);
                    println!("Link: {}", issued.link);
                    println!(
                        "Email: {:?}, SMS: {:?}",
                        issued.dispatch.email, issued.dispatch.sms
                    );
                    if issued.dispatch.has_problems() {
                        eprintln!("Warning: the link was not delivered on every requested channel");
                    }
                }
                Err(e) => eprintln!("Error issuing questionnaire: {}", e),
            }
        }
        Commands::List { status, patient } => {
            let status = status
                .as_deref()
                .map(str::parse::<QuestionnaireStatus>)
                .transpose()?;
            let questionnaires = match patient {
                Some(patient_id) => services.questionnaires.list_for_patient(patient_id, status)?,
                None => services.questionnaires.list(status)?,
            };
            if questionnaires.is_empty() {
                println!("No questionnaires found.");
            }
            for q in &questionnaires {
                print_questionnaire(q);
            }
        }
        Commands::Show { id } => match services.questionnaires.get(id) {
            Ok(q) => {
                print_questionnaire(&q);
                print_answers(&q.answers);
            }
            Err(e) => eprintln!("Error reading questionnaire: {}", e),
        },
        Commands::Open { token } => match services.questionnaires.open(&token) {
            Ok(view) => {
                println!("Patient: {}", view.patient_name);
                match view.availability {
                    Availability::Fillable => println!("Status: open for answers"),
                    Availability::AlreadyFilled => println!("Status: already submitted"),
                    Availability::Expired => println!("Status: link expired, contact clinic"),
                }
                print_answers(&view.prefill);
            }
            Err(ClinicError::QuestionnaireNotFound) => eprintln!("Link invalid"),
            Err(e) => eprintln!("Error opening questionnaire: {}", e),
        },
        Commands::Submit {
            token,
            medical_history,
            complaints,
            current_medications,
            allergies,
            notes,
        } => {
            let answers = QuestionnaireAnswers {
                medical_history,
                complaints,
                current_medications,
                allergies,
                notes,
            };
            match services.questionnaires.submit(&token, answers) {
                Ok(q) => println!("Questionnaire {} submitted", q.id),
                Err(ClinicError::AlreadyFilled) => println!("Questionnaire already submitted"),
                Err(ClinicError::Expired) => eprintln!("Link expired, contact clinic"),
                Err(ClinicError::QuestionnaireNotFound) => eprintln!("Link invalid"),
                Err(e) => eprintln!("Error submitting questionnaire: {}", e),
            }
        }
        Commands::Remind { appointment_id } => {
            match services.questionnaires.remind_appointment(appointment_id) {
                Ok(outcome) => println!("Reminder SMS: {:?}", outcome),
                Err(e) => eprintln!("Error sending reminder: {}", e),
            }
        }
    }

    Ok(())
}
