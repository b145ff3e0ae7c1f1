use super::shared::{decode_date, decode_ts, encode_date, encode_ts};
use crate::appointment::{Appointment, AppointmentStatus, NewAppointment};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, NaiveDate, Utc};
use clinic_types::{ClockTime, NonEmptyText};
use rusqlite::{params, Connection, OptionalExtension, Row};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, date, time, kind, notes, status, registered_at";

struct AppointmentRow {
    id: i64,
    patient_id: i64,
    date: String,
    time: String,
    kind: String,
    notes: Option<String>,
    status: String,
    registered_at: String,
}

impl AppointmentRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            date: row.get(2)?,
            time: row.get(3)?,
            kind: row.get(4)?,
            notes: row.get(5)?,
            status: row.get(6)?,
            registered_at: row.get(7)?,
        })
    }

    fn into_appointment(self) -> ClinicResult<Appointment> {
        let invalid = |field: &'static str, value: &str| ClinicError::InvalidStoredValue {
            field,
            value: value.to_owned(),
        };

        Ok(Appointment {
            id: self.id,
            patient_id: self.patient_id,
            date: decode_date("date", &self.date)?,
            time: self
                .time
                .parse::<ClockTime>()
                .map_err(|_| invalid("time", &self.time))?,
            kind: NonEmptyText::new(&self.kind).map_err(|_| invalid("kind", &self.kind))?,
            notes: self.notes,
            status: self.status.parse::<AppointmentStatus>()?,
            registered_at: decode_ts(&self.registered_at)?,
        })
    }
}

pub fn insert_appointment(
    conn: &Connection,
    patient_id: i64,
    new: &NewAppointment,
    registered_at: DateTime<Utc>,
) -> ClinicResult<Appointment> {
    conn.execute(
        "INSERT INTO appointments (patient_id, date, time, kind, notes, status, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patient_id,
            encode_date(new.date),
            new.time.to_string(),
            new.kind.as_str(),
            new.notes,
            AppointmentStatus::Scheduled.as_str(),
            encode_ts(registered_at),
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_appointment(conn, id)?.ok_or(ClinicError::AppointmentNotFound(id))
}

pub fn get_appointment(conn: &Connection, id: i64) -> ClinicResult<Option<Appointment>> {
    let row = conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            params![id],
            AppointmentRow::read,
        )
        .optional()?;

    row.map(AppointmentRow::into_appointment).transpose()
}

pub fn list_upcoming_for_patient(
    conn: &Connection,
    patient_id: i64,
    from: NaiveDate,
) -> ClinicResult<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE patient_id = ?1 AND status = 'scheduled' AND date >= ?2
         ORDER BY date, time, id"
    ))?;

    let rows = stmt
        .query_map(params![patient_id, encode_date(from)], AppointmentRow::read)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(AppointmentRow::into_appointment).collect()
}

pub fn update_status(
    conn: &Connection,
    id: i64,
    status: AppointmentStatus,
) -> ClinicResult<bool> {
    let changed = conn.execute(
        "UPDATE appointments SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    Ok(changed == 1)
}
