//! Outbound patient notifications.
//!
//! Delivery is best effort. Implementations report success as a `bool` and never return an
//! error: a provider outage or missing credentials is logged and reported to staff, but it must
//! not fail the questionnaire workflow that triggered it.

mod http;
pub mod messages;

pub use http::{HttpNotificationService, NotificationConfig, TwilioCredentials};

use clinic_types::EmailAddress;

/// Transport for email and SMS.
pub trait NotificationService: Send + Sync {
    /// Sends an email with both an HTML and a plain-text part.
    fn send_email(&self, to: &EmailAddress, subject: &str, html_body: &str, text_body: &str)
        -> bool;

    /// Sends an SMS to an E.164 number (`+5511999998888`).
    fn send_sms(&self, to_e164: &str, body: &str) -> bool;
}

/// Used when no provider is configured; every send is a logged no-op failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledNotificationService;

impl NotificationService for DisabledNotificationService {
    fn send_email(&self, _to: &EmailAddress, subject: &str, _html: &str, _text: &str) -> bool {
        tracing::warn!(subject, "notifications disabled, email not sent");
        false
    }

    fn send_sms(&self, _to_e164: &str, _body: &str) -> bool {
        tracing::warn!("notifications disabled, SMS not sent");
        false
    }
}

/// Normalises a stored phone number to E.164.
///
/// Numbers that already carry a `+` keep their own country code; anything else is assumed to
/// be national and gets `default_country_code` prefixed. Formatting characters are dropped.
/// Returns `None` when no digits remain.
pub fn to_e164(phone: &str, default_country_code: &str) -> Option<String> {
    let phone = phone.trim();
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    if phone.starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        let cc = default_country_code.trim_start_matches('+');
        Some(format!("+{cc}{digits}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn national_numbers_get_default_country_code() {
        assert_eq!(
            to_e164("(11) 99999-8888", "55").as_deref(),
            Some("+5511999998888")
        );
    }

    #[test]
    fn international_numbers_keep_their_prefix() {
        assert_eq!(
            to_e164(" +351 912 345 678 ", "55").as_deref(),
            Some("+351912345678")
        );
    }

    #[test]
    fn numbers_without_digits_are_rejected() {
        assert_eq!(to_e164("", "55"), None);
        assert_eq!(to_e164("n/a", "55"), None);
    }

    #[test]
    fn disabled_service_always_reports_failure() {
        let svc = DisabledNotificationService;
        let to = EmailAddress::parse("ana@example.com").unwrap();
        assert!(!svc.send_email(&to, "s", "<p>h</p>", "t"));
        assert!(!svc.send_sms("+5511999998888", "hello"));
    }
}
