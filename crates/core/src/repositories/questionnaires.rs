//! Questionnaire persistence.
//!
//! Every status change is a conditional write (`... AND status = 'pending'`). The row count
//! returned by SQLite tells the caller whether it won the transition; a zero means another
//! writer (or the expiry check) got there first.

use super::shared::{decode_opt_ts, decode_ts, encode_ts, is_unique_violation};
use crate::questionnaire::{
    NewQuestionnaire, Questionnaire, QuestionnaireAnswers, QuestionnaireFilter,
    QuestionnaireStatus,
};
use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Utc};
use clinic_token::AccessToken;
use rusqlite::{params, Connection, OptionalExtension, Row};

const QUESTIONNAIRE_COLUMNS: &str = "id, patient_id, appointment_id, token, status, sent_at,
     filled_at, medical_history, complaints, current_medications, allergies, notes";

struct QuestionnaireRow {
    id: i64,
    patient_id: i64,
    appointment_id: Option<i64>,
    token: String,
    status: String,
    sent_at: String,
    filled_at: Option<String>,
    answers: QuestionnaireAnswers,
}

impl QuestionnaireRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            appointment_id: row.get(2)?,
            token: row.get(3)?,
            status: row.get(4)?,
            sent_at: row.get(5)?,
            filled_at: row.get(6)?,
            answers: QuestionnaireAnswers {
                medical_history: row.get(7)?,
                complaints: row.get(8)?,
                current_medications: row.get(9)?,
                allergies: row.get(10)?,
                notes: row.get(11)?,
            },
        })
    }

    fn into_questionnaire(self) -> ClinicResult<Questionnaire> {
        let token = AccessToken::parse(&self.token).map_err(|_| ClinicError::InvalidStoredValue {
            field: "token",
            value: format!("questionnaire {}", self.id),
        })?;

        Ok(Questionnaire {
            id: self.id,
            patient_id: self.patient_id,
            appointment_id: self.appointment_id,
            token,
            status: self.status.parse()?,
            sent_at: decode_ts(&self.sent_at)?,
            filled_at: decode_opt_ts(self.filled_at)?,
            answers: self.answers,
        })
    }
}

/// Inserts a pending questionnaire.
///
/// # Errors
///
/// Returns `ClinicError::DuplicateToken` if the token is already taken.
pub fn insert_questionnaire(
    conn: &Connection,
    new: &NewQuestionnaire,
) -> ClinicResult<Questionnaire> {
    let result = conn.execute(
        "INSERT INTO questionnaires (patient_id, appointment_id, token, status, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.patient_id,
            new.appointment_id,
            new.token.as_str(),
            QuestionnaireStatus::Pending.as_str(),
            encode_ts(new.sent_at),
        ],
    );

    match result {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(ClinicError::DuplicateToken),
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    get_questionnaire(conn, id)?.ok_or(ClinicError::QuestionnaireNotFound)
}

pub fn get_questionnaire(conn: &Connection, id: i64) -> ClinicResult<Option<Questionnaire>> {
    let row = conn
        .query_row(
            &format!("SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires WHERE id = ?1"),
            params![id],
            QuestionnaireRow::read,
        )
        .optional()?;

    row.map(QuestionnaireRow::into_questionnaire).transpose()
}

pub fn get_questionnaire_by_token(
    conn: &Connection,
    token: &AccessToken,
) -> ClinicResult<Option<Questionnaire>> {
    let row = conn
        .query_row(
            &format!("SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires WHERE token = ?1"),
            params![token.as_str()],
            QuestionnaireRow::read,
        )
        .optional()?;

    row.map(QuestionnaireRow::into_questionnaire).transpose()
}

/// Lists questionnaires, newest first.
pub fn list_questionnaires(
    conn: &Connection,
    filter: &QuestionnaireFilter,
) -> ClinicResult<Vec<Questionnaire>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {QUESTIONNAIRE_COLUMNS} FROM questionnaires
         WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR patient_id = ?2)
         ORDER BY sent_at DESC, id DESC"
    ))?;

    let rows = stmt
        .query_map(
            params![filter.status.map(|s| s.as_str()), filter.patient_id],
            QuestionnaireRow::read,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(QuestionnaireRow::into_questionnaire)
        .collect()
}

/// Expires one questionnaire if it is still pending and was sent before `cutoff`.
pub fn expire_if_overdue(conn: &Connection, id: i64, cutoff: DateTime<Utc>) -> ClinicResult<bool> {
    let changed = conn.execute(
        "UPDATE questionnaires SET status = 'expired'
         WHERE id = ?1 AND status = 'pending' AND sent_at < ?2",
        params![id, encode_ts(cutoff)],
    )?;
    Ok(changed == 1)
}

/// Expires every pending questionnaire sent before `cutoff`; returns how many changed.
pub fn expire_overdue(conn: &Connection, cutoff: DateTime<Utc>) -> ClinicResult<usize> {
    let changed = conn.execute(
        "UPDATE questionnaires SET status = 'expired'
         WHERE status = 'pending' AND sent_at < ?1",
        params![encode_ts(cutoff)],
    )?;
    Ok(changed)
}

/// Records the answers and moves the questionnaire to `filled`, only if still pending.
pub fn mark_filled(
    conn: &Connection,
    id: i64,
    answers: &QuestionnaireAnswers,
    filled_at: DateTime<Utc>,
) -> ClinicResult<bool> {
    let changed = conn.execute(
        "UPDATE questionnaires
         SET status = 'filled', filled_at = ?2, medical_history = ?3, complaints = ?4,
             current_medications = ?5, allergies = ?6, notes = ?7
         WHERE id = ?1 AND status = 'pending'",
        params![
            id,
            encode_ts(filled_at),
            answers.medical_history,
            answers.complaints,
            answers.current_medications,
            answers.allergies,
            answers.notes,
        ],
    )?;
    Ok(changed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::patient::NewPatient;
    use crate::repositories::patients;
    use chrono::{Duration, TimeZone};
    use clinic_types::NonEmptyText;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap()
    }

    fn seeded() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let patient_id = db
            .with_conn(|conn| {
                patients::insert_patient(
                    conn,
                    &NewPatient::named(NonEmptyText::new("Ana").unwrap()),
                    t0(),
                )
            })
            .unwrap()
            .id;
        (db, patient_id)
    }

    fn pending(patient_id: i64, sent_at: DateTime<Utc>) -> NewQuestionnaire {
        NewQuestionnaire {
            patient_id,
            appointment_id: None,
            token: AccessToken::generate(),
            sent_at,
        }
    }

    #[test]
    fn duplicate_token_is_reported() {
        let (db, patient_id) = seeded();
        let new = pending(patient_id, t0());

        db.with_conn(|conn| insert_questionnaire(conn, &new)).unwrap();
        let again = db.with_conn(|conn| insert_questionnaire(conn, &new));

        assert!(matches!(again, Err(ClinicError::DuplicateToken)));
    }

    #[test]
    fn insert_for_unknown_patient_violates_foreign_key() {
        let (db, _) = seeded();
        let result = db.with_conn(|conn| insert_questionnaire(conn, &pending(999, t0())));
        assert!(matches!(result, Err(ClinicError::Database(_))));
    }

    #[test]
    fn mark_filled_only_wins_once() {
        let (db, patient_id) = seeded();
        let q = db
            .with_conn(|conn| insert_questionnaire(conn, &pending(patient_id, t0())))
            .unwrap();
        let answers = QuestionnaireAnswers {
            complaints: Some("toothache".into()),
            ..Default::default()
        };

        let first = db.with_conn(|conn| mark_filled(conn, q.id, &answers, t0())).unwrap();
        let second = db.with_conn(|conn| mark_filled(conn, q.id, &answers, t0())).unwrap();

        assert!(first);
        assert!(!second);
    }

    #[test]
    fn terminal_status_cannot_be_rewritten_even_directly() {
        let (db, patient_id) = seeded();
        let q = db
            .with_conn(|conn| insert_questionnaire(conn, &pending(patient_id, t0())))
            .unwrap();
        db.with_conn(|conn| expire_if_overdue(conn, q.id, t0() + Duration::seconds(1)))
            .unwrap();

        let reopen = db.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE questionnaires SET status = 'pending' WHERE id = ?1",
                params![q.id],
            )?)
        });
        assert!(reopen.is_err(), "trigger should reject leaving a terminal state");
    }

    #[test]
    fn expire_overdue_only_touches_old_pending_rows() {
        let (db, patient_id) = seeded();
        let old = db
            .with_conn(|conn| insert_questionnaire(conn, &pending(patient_id, t0())))
            .unwrap();
        let fresh = db
            .with_conn(|conn| {
                insert_questionnaire(conn, &pending(patient_id, t0() + Duration::days(5)))
            })
            .unwrap();

        let cutoff = t0() + Duration::days(1);
        let changed = db.with_conn(|conn| expire_overdue(conn, cutoff)).unwrap();
        assert_eq!(changed, 1);

        let expired = db
            .with_conn(|conn| {
                list_questionnaires(
                    conn,
                    &QuestionnaireFilter {
                        status: Some(QuestionnaireStatus::Expired),
                        patient_id: None,
                    },
                )
            })
            .unwrap();
        assert_eq!(expired.iter().map(|q| q.id).collect::<Vec<_>>(), vec![old.id]);

        let all = db
            .with_conn(|conn| list_questionnaires(conn, &QuestionnaireFilter::default()))
            .unwrap();
        assert_eq!(
            all.iter().map(|q| q.id).collect::<Vec<_>>(),
            vec![fresh.id, old.id],
            "listing should be newest first"
        );
    }
}
