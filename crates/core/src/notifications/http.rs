use super::NotificationService;
use crate::constants::{
    DEFAULT_FROM_EMAIL, NOTIFICATION_TIMEOUT_SECS, SENDGRID_API_BASE, TWILIO_API_BASE,
};
use clinic_types::EmailAddress;
use reqwest::blocking::Client;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Twilio account used for outgoing SMS.
#[derive(Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &self.account_sid)
            .field("from_number", &self.from_number)
            .finish_non_exhaustive()
    }
}

/// Provider credentials and endpoints, resolved once at startup.
#[derive(Clone)]
pub struct NotificationConfig {
    sendgrid_api_key: Option<String>,
    from_email: String,
    twilio: Option<TwilioCredentials>,
    sendgrid_base_url: String,
    twilio_base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("email_configured", &self.sendgrid_api_key.is_some())
            .field("from_email", &self.from_email)
            .field("twilio", &self.twilio)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NotificationConfig {
    /// Builds the configuration from raw (usually environment) values.
    ///
    /// Blank values count as unset. SMS is only enabled when all three Twilio values are
    /// present.
    pub fn new(
        sendgrid_api_key: Option<String>,
        from_email: Option<String>,
        twilio_account_sid: Option<String>,
        twilio_auth_token: Option<String>,
        twilio_phone_number: Option<String>,
    ) -> Self {
        let twilio = match (
            non_blank(twilio_account_sid),
            non_blank(twilio_auth_token),
            non_blank(twilio_phone_number),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Self {
            sendgrid_api_key: non_blank(sendgrid_api_key),
            from_email: non_blank(from_email).unwrap_or_else(|| DEFAULT_FROM_EMAIL.into()),
            twilio,
            sendgrid_base_url: SENDGRID_API_BASE.into(),
            twilio_base_url: TWILIO_API_BASE.into(),
            timeout: Duration::from_secs(NOTIFICATION_TIMEOUT_SECS),
        }
    }

    /// Points the service at alternative provider origins (sandboxes, local mocks).
    pub fn with_endpoints(mut self, sendgrid_base_url: &str, twilio_base_url: &str) -> Self {
        self.sendgrid_base_url = sendgrid_base_url.trim_end_matches('/').to_string();
        self.twilio_base_url = twilio_base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn email_enabled(&self) -> bool {
        self.sendgrid_api_key.is_some()
    }

    pub fn sms_enabled(&self) -> bool {
        self.twilio.is_some()
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }
}

/// SendGrid (email) and Twilio (SMS) over HTTPS.
///
/// Uses the blocking `reqwest` client, so calls must not run on an async executor thread. The
/// client is built on first use for the same reason.
pub struct HttpNotificationService {
    config: NotificationConfig,
    client: OnceLock<Client>,
}

impl HttpNotificationService {
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    fn client(&self) -> Option<&Client> {
        if let Some(client) = self.client.get() {
            return Some(client);
        }

        match Client::builder().timeout(self.config.timeout).build() {
            Ok(client) => Some(self.client.get_or_init(|| client)),
            Err(e) => {
                tracing::error!("failed to build HTTP client: {e}");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: [SendGridAddress<'a>; 1],
}

#[derive(Serialize)]
struct SendGridContent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

/// Body of `POST /v3/mail/send`.
#[derive(Serialize)]
struct SendGridMail<'a> {
    personalizations: [SendGridPersonalization<'a>; 1],
    from: SendGridAddress<'a>,
    subject: &'a str,
    content: [SendGridContent<'a>; 2],
}

impl NotificationService for HttpNotificationService {
    fn send_email(
        &self,
        to: &EmailAddress,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> bool {
        let Some(api_key) = self.config.sendgrid_api_key.as_deref() else {
            tracing::warn!("SENDGRID_API_KEY not set, email not sent");
            return false;
        };
        let Some(client) = self.client() else {
            return false;
        };

        // SendGrid requires text/plain to precede text/html.
        let body = SendGridMail {
            personalizations: [SendGridPersonalization {
                to: [SendGridAddress {
                    email: to.as_str(),
                }],
            }],
            from: SendGridAddress {
                email: &self.config.from_email,
            },
            subject,
            content: [
                SendGridContent {
                    kind: "text/plain",
                    value: text_body,
                },
                SendGridContent {
                    kind: "text/html",
                    value: html_body,
                },
            ],
        };

        let url = format!("{}/v3/mail/send", self.config.sendgrid_base_url);
        match client.post(&url).bearer_auth(api_key).json(&body).send() {
            Ok(response) if response.status().is_success() => {
                tracing::info!(to = %to, "email sent");
                true
            }
            Ok(response) => {
                tracing::error!(status = response.status().as_u16(), "email provider rejected message");
                false
            }
            Err(e) => {
                tracing::error!("error sending email: {e}");
                false
            }
        }
    }

    fn send_sms(&self, to_e164: &str, body: &str) -> bool {
        let Some(twilio) = self.config.twilio.as_ref() else {
            tracing::warn!("Twilio credentials not set, SMS not sent");
            return false;
        };
        let Some(client) = self.client() else {
            return false;
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.twilio_base_url, twilio.account_sid
        );
        let form = [
            ("To", to_e164),
            ("From", twilio.from_number.as_str()),
            ("Body", body),
        ];

        let response = client
            .post(&url)
            .basic_auth(&twilio.account_sid, Some(&twilio.auth_token))
            .form(&form)
            .send();

        match response {
            Ok(response) if response.status().is_success() => {
                let sid = response
                    .json::<serde_json::Value>()
                    .ok()
                    .and_then(|v| v.get("sid").and_then(|s| s.as_str()).map(str::to_owned));
                tracing::info!(sid = sid.as_deref().unwrap_or("-"), "SMS sent");
                true
            }
            Ok(response) => {
                tracing::error!(status = response.status().as_u16(), "SMS provider rejected message");
                false
            }
            Err(e) => {
                tracing::error!("error sending SMS: {e}");
                false
            }
        }
    }
}
