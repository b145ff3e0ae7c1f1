use super::shared::{decode_date, decode_ts, encode_date, encode_ts, is_unique_violation};
use crate::patient::{Gender, MedicalHistory, NewPatient, Patient};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_types::{Cpf, EmailAddress, NonEmptyText};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PATIENT_COLUMNS: &str = "id, name, birth_date, phone, email, address, cpf, gender,
     diseases, medications, allergies, surgeries, habits, notes, registered_at";

struct PatientRow {
    id: i64,
    name: String,
    birth_date: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    cpf: Option<String>,
    gender: Option<String>,
    diseases: Option<String>,
    medications: Option<String>,
    allergies: Option<String>,
    surgeries: Option<String>,
    habits: Option<String>,
    notes: Option<String>,
    registered_at: String,
}

impl PatientRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            birth_date: row.get(2)?,
            phone: row.get(3)?,
            email: row.get(4)?,
            address: row.get(5)?,
            cpf: row.get(6)?,
            gender: row.get(7)?,
            diseases: row.get(8)?,
            medications: row.get(9)?,
            allergies: row.get(10)?,
            surgeries: row.get(11)?,
            habits: row.get(12)?,
            notes: row.get(13)?,
            registered_at: row.get(14)?,
        })
    }

    fn into_patient(self) -> ClinicResult<Patient> {
        let invalid = |field: &'static str, value: &str| ClinicError::InvalidStoredValue {
            field,
            value: value.to_owned(),
        };

        Ok(Patient {
            id: self.id,
            name: NonEmptyText::new(&self.name).map_err(|_| invalid("name", &self.name))?,
            birth_date: self
                .birth_date
                .as_deref()
                .map(|d| decode_date("birth_date", d))
                .transpose()?,
            phone: self.phone,
            email: self
                .email
                .as_deref()
                .map(|e| EmailAddress::parse(e).map_err(|_| invalid("email", e)))
                .transpose()?,
            address: self.address,
            cpf: self
                .cpf
                .as_deref()
                .map(|c| Cpf::parse(c).map_err(|_| invalid("cpf", c)))
                .transpose()?,
            gender: self
                .gender
                .as_deref()
                .map(str::parse::<Gender>)
                .transpose()?,
            diseases: self.diseases,
            medications: self.medications,
            allergies: self.allergies,
            surgeries: self.surgeries,
            habits: self.habits,
            notes: self.notes,
            registered_at: decode_ts(&self.registered_at)?,
        })
    }
}

pub fn insert_patient(
    conn: &Connection,
    new: &NewPatient,
    registered_at: DateTime<Utc>,
) -> ClinicResult<Patient> {
    let result = conn.execute(
        "INSERT INTO patients (name, birth_date, phone, email, address, cpf, gender,
         diseases, medications, allergies, surgeries, habits, notes, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            new.name.as_str(),
            new.birth_date.map(encode_date),
            new.phone,
            new.email.as_ref().map(EmailAddress::as_str),
            new.address,
            new.cpf.as_ref().map(Cpf::as_str),
            new.gender.map(|g| g.as_str()),
            new.diseases,
            new.medications,
            new.allergies,
            new.surgeries,
            new.habits,
            new.notes,
            encode_ts(registered_at),
        ],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            let cpf = new.cpf.as_ref().map(ToString::to_string).unwrap_or_default();
            return Err(ClinicError::DuplicateCpf(cpf));
        }
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    get_patient(conn, id)?.ok_or(ClinicError::PatientNotFound(id))
}

pub fn get_patient(conn: &Connection, id: i64) -> ClinicResult<Option<Patient>> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id],
            PatientRow::read,
        )
        .optional()?;

    row.map(PatientRow::into_patient).transpose()
}

pub fn patient_exists(conn: &Connection, id: i64) -> ClinicResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM patients WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub fn search_patients(conn: &Connection, query: Option<&str>) -> ClinicResult<Vec<Patient>> {
    let pattern = query.map(|q| format!("%{q}%"));
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE ?1 IS NULL OR name LIKE ?1 OR cpf LIKE ?1
         ORDER BY name COLLATE NOCASE, id"
    ))?;

    let rows = stmt
        .query_map(params![pattern], PatientRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(PatientRow::into_patient).collect()
}

/// Overwrites the questionnaire-fed medical fields. Returns false if the patient is missing.
pub fn update_medical_history(
    conn: &Connection,
    id: i64,
    history: &MedicalHistory,
) -> ClinicResult<bool> {
    let changed = conn.execute(
        "UPDATE patients SET diseases = ?2, medications = ?3, allergies = ?4 WHERE id = ?1",
        params![id, history.diseases, history.medications, history.allergies],
    )?;
    Ok(changed == 1)
}
