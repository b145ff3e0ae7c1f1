//! Validated value types shared across the clinic crates.
//!
//! Each type guarantees its invariant once constructed, so downstream code (repositories, API
//! handlers, CLI) never re-validates free-form strings.

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("CPF must contain 11 digits")]
    CpfLength,
    #[error("invalid CPF")]
    InvalidCpf,
    #[error("invalid time format, use HH:MM")]
    InvalidTime,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts an optional free-text field into `Some` only when it carries content.
    pub fn optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An email address that passed a conservative syntactic check.
///
/// Only syntax is checked: one `@`, a non-empty local part, a dotted domain, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        let invalid = || TextError::InvalidEmail(trimmed.to_owned());

        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        let (local, domain) = trimmed.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }

        let labels_ok = domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-'));
        if !domain.contains('.') || !labels_ok {
            return Err(invalid());
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Brazilian taxpayer number, stored in the canonical `000.000.000-00` layout.
///
/// Any punctuation in the input is discarded before validation. Sequences of a single repeated
/// digit (e.g. `111.111.111-11`) are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpf(String);

impl Cpf {
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let digits: String = input
            .as_ref()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        if digits.len() != 11 {
            return Err(TextError::CpfLength);
        }

        let first = digits.as_bytes()[0];
        if digits.bytes().all(|b| b == first) {
            return Err(TextError::InvalidCpf);
        }

        Ok(Self(format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock appointment time (`HH:MM`, 24-hour).
///
/// Single-digit hours are accepted on input (`9:30`) and always rendered zero-padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TextError> {
        if hour > 23 || minute > 59 {
            return Err(TextError::InvalidTime);
        }
        Ok(Self { hour, minute })
    }
}

impl FromStr for ClockTime {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s.trim().split_once(':').ok_or(TextError::InvalidTime)?;

        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(h) || h.len() > 2 || !all_digits(m) || m.len() != 2 {
            return Err(TextError::InvalidTime);
        }

        let hour = h.parse().map_err(|_| TextError::InvalidTime)?;
        let minute = m.parse().map_err(|_| TextError::InvalidTime)?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

macro_rules! string_serde {
    ($ty:ty, $ctor:path) => {
        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ctor(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

string_serde!(NonEmptyText, NonEmptyText::new);
string_serde!(EmailAddress, EmailAddress::parse);
string_serde!(Cpf, Cpf::parse);
string_serde!(ClockTime, ClockTime::from_str);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  Maria  ").unwrap().as_str(), "Maria");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
        assert!(NonEmptyText::optional(Some("\n")).is_none());
        assert!(NonEmptyText::optional(None::<&str>).is_none());
    }

    #[test]
    fn email_accepts_plain_addresses() {
        let email = EmailAddress::parse(" ana@clinic.com.br ").unwrap();
        assert_eq!(email.as_str(), "ana@clinic.com.br");
    }

    #[test]
    fn email_rejects_malformed_addresses() {
        for bad in ["", "ana", "ana@", "@clinic.com", "ana@clinic", "a b@c.com", "a@b@c.com", "a@.com"] {
            assert!(EmailAddress::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn cpf_is_normalised_to_punctuated_form() {
        assert_eq!(Cpf::parse("12345678909").unwrap().as_str(), "123.456.789-09");
        assert_eq!(Cpf::parse("123.456.789-09").unwrap().as_str(), "123.456.789-09");
    }

    #[test]
    fn cpf_rejects_wrong_length_and_repeated_digits() {
        assert_eq!(Cpf::parse("1234567890"), Err(TextError::CpfLength));
        assert_eq!(Cpf::parse("111.111.111-11"), Err(TextError::InvalidCpf));
    }

    #[test]
    fn clock_time_parses_and_pads() {
        assert_eq!("9:05".parse::<ClockTime>().unwrap().to_string(), "09:05");
        assert_eq!("23:59".parse::<ClockTime>().unwrap().to_string(), "23:59");
        assert_eq!("00:00".parse::<ClockTime>().unwrap(), ClockTime::new(0, 0).unwrap());
    }

    #[test]
    fn clock_time_rejects_out_of_range() {
        for bad in ["24:00", "12:60", "12:5", "123:00", "ab:cd", "1200", ""] {
            assert!(bad.parse::<ClockTime>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn serde_goes_through_validation() {
        let time: ClockTime = serde_json::from_str("\"8:30\"").unwrap();
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"08:30\"");
        assert!(serde_json::from_str::<Cpf>("\"000\"").is_err());
    }
}
