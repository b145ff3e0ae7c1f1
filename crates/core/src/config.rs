//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables;
//! binaries read them in `main` and hand the parsed values to [`CoreConfig::new`].

use crate::constants::{
    DEFAULT_COUNTRY_CODE, DEFAULT_QUESTIONNAIRE_EXPIRY_DAYS, MAX_QUESTIONNAIRE_EXPIRY_DAYS,
    QUESTIONNAIRE_LINK_PREFIX,
};
use crate::questionnaire::ExpiryPolicy;
use crate::{ClinicError, ClinicResult};
use clinic_token::AccessToken;
use clinic_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    database_path: PathBuf,
    public_base_url: String,
    expiry: ExpiryPolicy,
    default_country_code: String,
    clinic_name: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// `public_base_url` is the externally reachable origin patients open links on, e.g.
    /// `https://clinic.example`. A trailing slash is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError::InvalidInput` if the base URL is not an http(s) URL, the expiry
    /// window is outside `1..=MAX_QUESTIONNAIRE_EXPIRY_DAYS` days, or the country code is not
    /// 1-3 digits.
    pub fn new(
        database_path: PathBuf,
        public_base_url: &str,
        expiry_days: u32,
        default_country_code: &str,
        clinic_name: NonEmptyText,
    ) -> ClinicResult<Self> {
        let public_base_url = public_base_url.trim().trim_end_matches('/');
        if !(public_base_url.starts_with("http://") || public_base_url.starts_with("https://"))
            || public_base_url.contains(char::is_whitespace)
        {
            return Err(ClinicError::InvalidInput(format!(
                "public base URL must start with http:// or https://, got '{public_base_url}'"
            )));
        }

        if !(1..=MAX_QUESTIONNAIRE_EXPIRY_DAYS).contains(&expiry_days) {
            return Err(ClinicError::InvalidInput(format!(
                "questionnaire expiry must be between 1 and {MAX_QUESTIONNAIRE_EXPIRY_DAYS} days, got {expiry_days}"
            )));
        }

        let default_country_code = default_country_code.trim().trim_start_matches('+');
        if default_country_code.is_empty()
            || default_country_code.len() > 3
            || !default_country_code.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(ClinicError::InvalidInput(
                "default country code must be 1-3 digits".into(),
            ));
        }

        Ok(Self {
            database_path,
            public_base_url: public_base_url.to_owned(),
            expiry: ExpiryPolicy::days(expiry_days),
            default_country_code: default_country_code.to_owned(),
            clinic_name,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        self.expiry
    }

    pub fn default_country_code(&self) -> &str {
        &self.default_country_code
    }

    pub fn clinic_name(&self) -> &NonEmptyText {
        &self.clinic_name
    }

    /// Patient-facing link for a questionnaire token.
    pub fn questionnaire_link(&self, token: &AccessToken) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url, QUESTIONNAIRE_LINK_PREFIX, token
        )
    }
}

/// Parse the questionnaire expiry window from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of seven days.
pub fn expiry_days_from_env_value(value: Option<String>) -> ClinicResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_QUESTIONNAIRE_EXPIRY_DAYS),
        Some(v) => v.parse::<u32>().map_err(|_| {
            ClinicError::InvalidInput(format!(
                "QUESTIONNAIRE_EXPIRY_DAYS must be a positive integer, got '{v}'"
            ))
        }),
    }
}

/// Parse the default phone country code, falling back to Brazil (`55`).
pub fn country_code_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(base: &str) -> ClinicResult<CoreConfig> {
        CoreConfig::new(
            PathBuf::from("clinic.db"),
            base,
            7,
            "55",
            NonEmptyText::new("Test Clinic").unwrap(),
        )
    }

    #[test]
    fn questionnaire_link_joins_base_and_token() {
        let cfg = cfg("https://clinic.example/").expect("config should be valid");
        let token = AccessToken::generate();

        assert_eq!(
            cfg.questionnaire_link(&token),
            format!("https://clinic.example/q/{token}")
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(cfg("clinic.example").is_err());
        assert!(cfg("ftp://clinic.example").is_err());
        assert!(cfg("https://clinic .example").is_err());
    }

    #[test]
    fn rejects_zero_day_expiry_and_bad_country_code() {
        let name = NonEmptyText::new("Test Clinic").unwrap();
        assert!(CoreConfig::new("db".into(), "http://x", 0, "55", name.clone()).is_err());
        assert!(CoreConfig::new("db".into(), "http://x", 7, "5a", name.clone()).is_err());
        assert!(CoreConfig::new("db".into(), "http://x", 7, "+351", name).is_ok());
    }

    #[test]
    fn rejects_expiry_beyond_ten_years() {
        let name = NonEmptyText::new("Test Clinic").unwrap();
        let accepted = CoreConfig::new("db".into(), "http://x", 3650, "55", name.clone())
            .expect("ten years should be accepted");
        assert_eq!(accepted.expiry().whole_days(), 3650);

        for days in [3651, 100_000_000, u32::MAX] {
            let err = CoreConfig::new("db".into(), "http://x", days, "55", name.clone())
                .expect_err("oversized expiry should be rejected");
            assert!(matches!(err, ClinicError::InvalidInput(_)));
        }
    }

    #[test]
    fn expiry_days_defaults_to_seven() {
        assert_eq!(expiry_days_from_env_value(None).unwrap(), 7);
        assert_eq!(expiry_days_from_env_value(Some("  ".into())).unwrap(), 7);
        assert_eq!(expiry_days_from_env_value(Some("14".into())).unwrap(), 14);
        assert!(expiry_days_from_env_value(Some("week".into())).is_err());
    }
}
