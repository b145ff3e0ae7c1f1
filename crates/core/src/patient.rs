//! Patient registry.
//!
//! The questionnaire workflow reads patients for contact details and pre-fill, and writes the
//! medical-history fields back on submission. Registration and search are kept minimal.

use crate::clock::{Clock, SystemClock};
use crate::db::Database;
use crate::repositories::patients;
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use clinic_types::{Cpf, EmailAddress, NonEmptyText};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::PreferNotToSay => "prefer_not_to_say",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "prefer_not_to_say" => Ok(Gender::PreferNotToSay),
            other => Err(ClinicError::InvalidInput(format!("unknown gender '{other}'"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub id: i64,
    pub name: NonEmptyText,
    pub birth_date: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<EmailAddress>,
    pub address: Option<String>,
    pub cpf: Option<Cpf>,
    pub gender: Option<Gender>,
    pub diseases: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
    pub surgeries: Option<String>,
    pub habits: Option<String>,
    pub notes: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Patient {
    /// Age in whole years on `today`, if the birth date is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut years = today.year() - birth.year();
        if (today.month(), today.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

/// Fields that a questionnaire submission overwrites on the patient record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MedicalHistory {
    pub diseases: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewPatient {
    pub name: NonEmptyText,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<EmailAddress>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub cpf: Option<Cpf>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub diseases: Option<String>,
    #[serde(default)]
    pub medications: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub surgeries: Option<String>,
    #[serde(default)]
    pub habits: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewPatient {
    /// A registration carrying only the required name.
    pub fn named(name: NonEmptyText) -> Self {
        Self {
            name,
            birth_date: None,
            phone: None,
            email: None,
            address: None,
            cpf: None,
            gender: None,
            diseases: None,
            medications: None,
            allergies: None,
            surgeries: None,
            habits: None,
            notes: None,
        }
    }
}

/// Pure patient data operations - no API concerns
#[derive(Clone)]
pub struct PatientService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
}

impl PatientService {
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

    /// Registers a new patient.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::DuplicateCpf` if another patient already holds the CPF, or
    /// `ClinicError::InvalidInput` for a birth date in the future.
    pub fn register(&self, new: NewPatient) -> ClinicResult<Patient> {
        let now = self.clock.now();
        if new.birth_date.is_some_and(|d| d > now.date_naive()) {
            return Err(ClinicError::InvalidInput(
                "birth date cannot be in the future".into(),
            ));
        }

        let patient = self
            .db
            .with_conn(|conn| patients::insert_patient(conn, &new, now))?;
        tracing::info!(patient_id = patient.id, "patient registered");
        Ok(patient)
    }

    pub fn get(&self, id: i64) -> ClinicResult<Patient> {
        self.db
            .with_conn(|conn| patients::get_patient(conn, id))?
            .ok_or(ClinicError::PatientNotFound(id))
    }

    /// Searches by name or CPF fragment; an empty query lists everyone, ordered by name.
    pub fn search(&self, query: Option<&str>) -> ClinicResult<Vec<Patient>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        self.db
            .with_conn(|conn| patients::search_patients(conn, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PatientService {
        PatientService::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient::named(NonEmptyText::new(name).unwrap())
    }

    #[test]
    fn register_and_get_round_trip() {
        let service = service();
        let mut new = new_patient("Maria Souza");
        new.cpf = Some(Cpf::parse("12345678909").unwrap());
        new.email = Some(EmailAddress::parse("maria@example.com").unwrap());
        new.allergies = Some("latex".into());
        new.gender = Some(Gender::Female);

        let created = service.register(new).expect("register should succeed");
        let fetched = service.get(created.id).expect("get should succeed");

        assert_eq!(fetched, created);
        assert_eq!(fetched.cpf.unwrap().as_str(), "123.456.789-09");
        assert_eq!(fetched.allergies.as_deref(), Some("latex"));
    }

    #[test]
    fn duplicate_cpf_is_rejected() {
        let service = service();
        let mut first = new_patient("Ana");
        first.cpf = Some(Cpf::parse("123.456.789-09").unwrap());
        let mut second = new_patient("Bia");
        second.cpf = Some(Cpf::parse("12345678909").unwrap());

        service.register(first).unwrap();
        assert!(matches!(
            service.register(second),
            Err(ClinicError::DuplicateCpf(_))
        ));
    }

    #[test]
    fn get_unknown_patient_is_not_found() {
        assert!(matches!(
            service().get(42),
            Err(ClinicError::PatientNotFound(42))
        ));
    }

    #[test]
    fn search_matches_name_and_cpf_fragments() {
        let service = service();
        let mut ana = new_patient("Ana Lima");
        ana.cpf = Some(Cpf::parse("98765432100").unwrap());
        service.register(ana).unwrap();
        service.register(new_patient("Bruno Costa")).unwrap();

        let by_name = service.search(Some("lima")).unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name.as_str(), "Ana Lima");

        let by_cpf = service.search(Some("987.654")).unwrap();
        assert_eq!(by_cpf.len(), 1);

        let everyone = service.search(Some("  ")).unwrap();
        let names: Vec<_> = everyone.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Ana Lima", "Bruno Costa"]);
    }

    #[test]
    fn age_accounts_for_birthday_not_yet_reached() {
        let service = service();
        let mut new = new_patient("Carla");
        new.birth_date = NaiveDate::from_ymd_opt(1990, 6, 15);
        let patient = service.register(new).unwrap();

        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2026, 6, 14).unwrap()), Some(35));
        assert_eq!(patient.age_on(NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()), Some(36));
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let mut new = new_patient("Future");
        new.birth_date = NaiveDate::from_ymd_opt(2999, 1, 1);
        assert!(matches!(
            service().register(new),
            Err(ClinicError::InvalidInput(_))
        ));
    }
}
