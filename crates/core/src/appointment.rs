//! Appointment scheduling.
//!
//! Appointments are a collaborator of the questionnaire workflow: a questionnaire may be tied to
//! an upcoming appointment, and the reminder SMS is built from one.

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::repositories::{appointments, patients};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_types::{ClockTime, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown appointment status '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub date: NaiveDate,
    pub time: ClockTime,
    pub kind: NonEmptyText,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub registered_at: DateTime<Utc>,
}

impl Appointment {
    /// Label used in staff pickers, e.g. `14/03/2026 - 09:30 - Cleaning`.
    pub fn label(&self) -> String {
        format!("{} - {} - {}", self.date.format("%d/%m/%Y"), self.time, self.kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time: ClockTime,
    pub kind: NonEmptyText,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct AppointmentService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl AppointmentService {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Schedules an appointment for an existing patient.
    pub fn schedule(&self, patient_id: i64, new: NewAppointment) -> ClinicResult<Appointment> {
        let now = self.clock.now();
        let appointment = self.db.with_conn(|conn| {
            if !patients::patient_exists(conn, patient_id)? {
                return Err(ClinicError::PatientNotFound(patient_id));
            }
            appointments::insert_appointment(conn, patient_id, &new, now)
        })?;

        tracing::info!(
            appointment_id = appointment.id,
            patient_id,
            "appointment scheduled"
        );
        Ok(appointment)
    }

    pub fn get(&self, id: i64) -> ClinicResult<Appointment> {
        self.db
            .with_conn(|conn| appointments::get_appointment(conn, id))?
            .ok_or(ClinicError::AppointmentNotFound(id))
    }

    /// Scheduled appointments from today onwards, soonest first.
    pub fn upcoming_for_patient(&self, patient_id: i64) -> ClinicResult<Vec<Appointment>> {
        let today = self.clock.now().date_naive();
        self.db.with_conn(|conn| {
            if !patients::patient_exists(conn, patient_id)? {
                return Err(ClinicError::PatientNotFound(patient_id));
            }
            appointments::list_upcoming_for_patient(conn, patient_id, today)
        })
    }

    pub fn set_status(&self, id: i64, status: AppointmentStatus) -> ClinicResult<Appointment> {
        self.db.with_conn(|conn| {
            if !appointments::update_status(conn, id, status)? {
                return Err(ClinicError::AppointmentNotFound(id));
            }
            appointments::get_appointment(conn, id)?.ok_or(ClinicError::AppointmentNotFound(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::patient::{NewPatient, PatientService};
    use chrono::TimeZone;

    struct Fixture {
        appointments: AppointmentService,
        patient_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
        ));
        let patient = PatientService::new(db.clone())
            .register(NewPatient::named(NonEmptyText::new("Ana").unwrap()))
            .unwrap();

        Fixture {
            appointments: AppointmentService::new(db).with_clock(clock),
            patient_id: patient.id,
        }
    }

    fn new_appointment(y: i32, m: u32, d: u32, time: &str) -> NewAppointment {
        NewAppointment {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            time: time.parse().unwrap(),
            kind: NonEmptyText::new("Cleaning").unwrap(),
            notes: None,
        }
    }

    #[test]
    fn schedule_requires_existing_patient() {
        let f = fixture();
        assert!(matches!(
            f.appointments.schedule(999, new_appointment(2026, 3, 12, "09:00")),
            Err(ClinicError::PatientNotFound(999))
        ));
    }

    #[test]
    fn upcoming_excludes_past_and_non_scheduled() {
        let f = fixture();
        let past = f
            .appointments
            .schedule(f.patient_id, new_appointment(2026, 3, 9, "09:00"))
            .unwrap();
        let later = f
            .appointments
            .schedule(f.patient_id, new_appointment(2026, 3, 20, "08:00"))
            .unwrap();
        let today = f
            .appointments
            .schedule(f.patient_id, new_appointment(2026, 3, 10, "16:30"))
            .unwrap();
        let cancelled = f
            .appointments
            .schedule(f.patient_id, new_appointment(2026, 3, 11, "10:00"))
            .unwrap();
        f.appointments
            .set_status(cancelled.id, AppointmentStatus::Cancelled)
            .unwrap();

        let upcoming: Vec<i64> = f
            .appointments
            .upcoming_for_patient(f.patient_id)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();

        assert_eq!(upcoming, vec![today.id, later.id]);
        assert!(!upcoming.contains(&past.id));
    }

    #[test]
    fn label_uses_day_month_year() {
        let f = fixture();
        let appt = f
            .appointments
            .schedule(f.patient_id, new_appointment(2026, 3, 14, "9:30"))
            .unwrap();
        assert_eq!(appt.label(), "14/03/2026 - 09:30 - Cleaning");
    }
}
