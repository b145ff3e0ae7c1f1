//! Column encoding helpers shared by the repository modules.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with microsecond precision, so
//! lexicographic order in SQL matches chronological order.

use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> ClinicResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| ClinicError::InvalidTimestamp)
}

pub(crate) fn decode_opt_ts(raw: Option<String>) -> ClinicResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(decode_ts).transpose()
}

pub(crate) fn encode_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn decode_date(field: &'static str, raw: &str) -> ClinicResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ClinicError::InvalidStoredValue {
        field,
        value: raw.to_owned(),
    })
}

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2026, 1, 9, 23, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();

        assert!(encode_ts(earlier) < encode_ts(later));
        assert_eq!(encode_ts(later), "2026-01-10T00:00:00.000000Z");
        assert_eq!(decode_ts(&encode_ts(later)).unwrap(), later);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_ts("yesterday").is_err());
        assert!(decode_date("birth_date", "01/02/2026").is_err());
    }
}
