//! Message bodies sent to patients.

use crate::appointment::Appointment;

/// A rendered email.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Email carrying the questionnaire link.
pub fn questionnaire_email(
    clinic_name: &str,
    patient_name: &str,
    link: &str,
    valid_days: i64,
) -> EmailMessage {
    let subject = format!("Pre-visit questionnaire - {clinic_name}");

    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Hello, {name}!</h2>
  <p>You have an upcoming appointment at {clinic}.</p>
  <p>Please fill in the pre-visit questionnaire using the link below:</p>
  <p><a href="{link}" style="display: inline-block; background-color: #4CAF50; color: white; padding: 10px 20px; text-decoration: none; border-radius: 5px;">Fill in questionnaire</a></p>
  <p>This link is personal and expires in {days} days.</p>
  <p>If you did not expect this message, please ignore it.</p>
  <p>Kind regards,<br>{clinic}</p>
</div>"#,
        name = escape_html(patient_name),
        clinic = escape_html(clinic_name),
        link = escape_html(link),
        days = valid_days,
    );

    let text = format!(
        "Hello, {patient_name}!\n\n\
         You have an upcoming appointment at {clinic_name}.\n\
         Please fill in the pre-visit questionnaire at:\n\
         {link}\n\n\
         This link is personal and expires in {valid_days} days.\n\
         If you did not expect this message, please ignore it.\n\n\
         Kind regards,\n\
         {clinic_name}\n"
    );

    EmailMessage {
        subject,
        html,
        text,
    }
}

/// SMS carrying the questionnaire link.
pub fn questionnaire_sms(clinic_name: &str, patient_name: &str, link: &str, valid_days: i64) -> String {
    format!(
        "Hello {patient_name}, please fill in your pre-visit questionnaire for {clinic_name}: \
         {link} (valid for {valid_days} days)."
    )
}

/// SMS reminding the patient of a scheduled appointment.
pub fn appointment_reminder_sms(
    clinic_name: &str,
    patient_name: &str,
    appointment: &Appointment,
) -> String {
    format!(
        "Hello {patient_name}, this is a reminder of your appointment on {} at {}. {clinic_name}.",
        appointment.date.format("%d/%m/%Y"),
        appointment.time,
    )
}

/// Escapes text for interpolation into HTML element content or a quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
