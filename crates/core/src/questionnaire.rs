//! Pre-visit questionnaire records and their lifecycle.
//!
//! A questionnaire is created `pending` with a fresh access token and moves exactly once to a
//! terminal state:
//!
//! ```text
//!            submit
//! pending ───────────▶ filled
//!    │
//!    │ accessed after the expiry window
//!    ▼
//! expired
//! ```
//!
//! Expiry is lazy: there is no background sweeper. Every read path evaluates
//! [`ExpiryPolicy::is_overdue`] and persists the transition before returning.

use crate::{ClinicError, ClinicResult};
use chrono::{DateTime, Duration, Utc};
use clinic_token::AccessToken;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireStatus {
    Pending,
    Filled,
    Expired,
}

impl QuestionnaireStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionnaireStatus::Pending => "pending",
            QuestionnaireStatus::Filled => "filled",
            QuestionnaireStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for QuestionnaireStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionnaireStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(QuestionnaireStatus::Pending),
            "filled" => Ok(QuestionnaireStatus::Filled),
            "expired" => Ok(QuestionnaireStatus::Expired),
            other => Err(ClinicError::InvalidInput(format!(
                "unknown questionnaire status '{other}' (expected pending, filled or expired)"
            ))),
        }
    }
}

/// Validity window of a pending questionnaire link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
    window: Duration,
}

impl ExpiryPolicy {
    pub fn days(days: u32) -> Self {
        Self {
            window: Duration::days(i64::from(days)),
        }
    }

    pub fn whole_days(&self) -> i64 {
        self.window.num_days()
    }

    /// Saturates at the latest representable instant.
    pub fn expires_at(&self, sent_at: DateTime<Utc>) -> DateTime<Utc> {
        sent_at
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Pending links sent strictly before this instant are overdue at `now`.
    ///
    /// Saturates at the earliest representable instant, so nothing is overdue.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// True once more than the full window has elapsed since `sent_at`.
    pub fn is_overdue(&self, sent_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - sent_at > self.window
    }

    /// Status a stored record should have when accessed at `now`.
    pub fn status_on_access(
        &self,
        status: QuestionnaireStatus,
        sent_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> QuestionnaireStatus {
        match status {
            QuestionnaireStatus::Pending if self.is_overdue(sent_at, now) => {
                QuestionnaireStatus::Expired
            }
            other => other,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::days(crate::constants::DEFAULT_QUESTIONNAIRE_EXPIRY_DAYS)
    }
}

/// Free-text answers collected by the questionnaire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub complaints: Option<String>,
    #[serde(default)]
    pub current_medications: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl QuestionnaireAnswers {
    /// Trims every field and turns blank answers into `None`.
    pub fn normalised(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        }

        Self {
            medical_history: clean(self.medical_history),
            complaints: clean(self.complaints),
            current_medications: clean(self.current_medications),
            allergies: clean(self.allergies),
            notes: clean(self.notes),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Questionnaire {
    pub id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub token: AccessToken,
    pub status: QuestionnaireStatus,
    pub sent_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub answers: QuestionnaireAnswers,
}

impl Questionnaire {
    pub fn availability(&self) -> Availability {
        match self.status {
            QuestionnaireStatus::Pending => Availability::Fillable,
            QuestionnaireStatus::Filled => Availability::AlreadyFilled,
            QuestionnaireStatus::Expired => Availability::Expired,
        }
    }

    /// Fails with the terminal-state error if the questionnaire cannot take a submission.
    pub fn ensure_fillable(&self) -> ClinicResult<()> {
        match self.status {
            QuestionnaireStatus::Pending => Ok(()),
            QuestionnaireStatus::Filled => Err(ClinicError::AlreadyFilled),
            QuestionnaireStatus::Expired => Err(ClinicError::Expired),
        }
    }
}

/// What a patient opening the link is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Fillable,
    AlreadyFilled,
    Expired,
}

/// Insert payload; the store assigns the id and the answer columns start empty.
#[derive(Clone, Debug)]
pub struct NewQuestionnaire {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub token: AccessToken,
    pub sent_at: DateTime<Utc>,
}

/// Filters for staff listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuestionnaireFilter {
    pub status: Option<QuestionnaireStatus>,
    pub patient_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn pending_stays_pending_inside_window() {
        let policy = ExpiryPolicy::days(7);
        let now = t0() + Duration::days(7);

        assert_eq!(
            policy.status_on_access(QuestionnaireStatus::Pending, t0(), now),
            QuestionnaireStatus::Pending
        );
    }

    #[test]
    fn pending_expires_once_window_is_exceeded() {
        let policy = ExpiryPolicy::days(7);
        let now = t0() + Duration::days(7) + Duration::seconds(1);

        assert_eq!(
            policy.status_on_access(QuestionnaireStatus::Pending, t0(), now),
            QuestionnaireStatus::Expired
        );
    }

    #[test]
    fn terminal_states_never_change_on_access() {
        let policy = ExpiryPolicy::days(7);
        let later = t0() + Duration::days(30);

        for status in [QuestionnaireStatus::Filled, QuestionnaireStatus::Expired] {
            assert_eq!(policy.status_on_access(status, t0(), later), status);
        }
    }

    #[test]
    fn cutoff_and_expires_at_bracket_the_window() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.whole_days(), 7);
        assert_eq!(policy.expires_at(t0()), t0() + Duration::days(7));
        assert_eq!(policy.cutoff(t0() + Duration::days(7)), t0());
    }

    #[test]
    fn oversized_window_saturates_instead_of_overflowing() {
        let policy = ExpiryPolicy::days(u32::MAX);

        assert_eq!(policy.expires_at(t0()), DateTime::<Utc>::MAX_UTC);
        assert_eq!(policy.cutoff(t0()), DateTime::<Utc>::MIN_UTC);
        assert!(!policy.is_overdue(t0(), t0() + Duration::days(30)));
    }

    #[test]
    fn status_parses_from_stored_strings() {
        for status in [
            QuestionnaireStatus::Pending,
            QuestionnaireStatus::Filled,
            QuestionnaireStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<QuestionnaireStatus>().unwrap(), status);
        }
        assert!("preenchido".parse::<QuestionnaireStatus>().is_err());
    }

    #[test]
    fn answers_are_trimmed_and_blanks_dropped() {
        let answers = QuestionnaireAnswers {
            medical_history: Some("  hypertension ".into()),
            complaints: Some("   ".into()),
            current_medications: None,
            allergies: Some("penicillin".into()),
            notes: Some(String::new()),
        }
        .normalised();

        assert_eq!(answers.medical_history.as_deref(), Some("hypertension"));
        assert_eq!(answers.complaints, None);
        assert_eq!(answers.allergies.as_deref(), Some("penicillin"));
        assert_eq!(answers.notes, None);
        assert_eq!(
            QuestionnaireAnswers::default().normalised(),
            QuestionnaireAnswers::default()
        );
    }

    #[test]
    fn ensure_fillable_maps_terminal_states_to_errors() {
        let mut q = Questionnaire {
            id: 1,
            patient_id: 1,
            appointment_id: None,
            token: AccessToken::generate(),
            status: QuestionnaireStatus::Pending,
            sent_at: t0(),
            filled_at: None,
            answers: QuestionnaireAnswers::default(),
        };
        assert!(q.ensure_fillable().is_ok());
        assert_eq!(q.availability(), Availability::Fillable);

        q.status = QuestionnaireStatus::Filled;
        assert!(matches!(q.ensure_fillable(), Err(ClinicError::AlreadyFilled)));

        q.status = QuestionnaireStatus::Expired;
        assert!(matches!(q.ensure_fillable(), Err(ClinicError::Expired)));
        assert_eq!(q.availability(), Availability::Expired);
    }
}
