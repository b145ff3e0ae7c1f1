//! Internal implementation of the access token type.

use crate::{TokenError, TokenResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::{fmt, str::FromStr};

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 32;

/// Length of the encoded token (`ceil(32 * 4 / 3)` without padding).
pub const TOKEN_LEN: usize = 43;

/// A questionnaire access token in canonical form.
///
/// # Construction
/// - [`AccessToken::generate`] mints a fresh token for a new questionnaire.
/// - [`AccessToken::parse`] validates an externally supplied token.
///
/// # Display format
/// `Display` yields the full token (it is embedded in links). `Debug` only shows a short prefix
/// so tokens do not leak into logs through `{:?}`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generates a new token from the OS random number generator.
    ///
    /// 256 bits of entropy puts brute force far outside any practical validity window.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Validates and wraps a token string that must already be canonical.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> TokenResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(TokenError::InvalidInput(format!(
            "token must be {TOKEN_LEN} URL-safe base64 characters without padding"
        )))
    }

    /// Returns true if `input` is a canonical token.
    ///
    /// Besides length and alphabet, the input must decode to exactly [`TOKEN_BYTES`] bytes and
    /// re-encode to itself, which rules out non-zero trailing bits.
    pub fn is_canonical(input: &str) -> bool {
        if input.len() != TOKEN_LEN
            || !input
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return false;
        }

        match URL_SAFE_NO_PAD.decode(input) {
            Ok(bytes) => bytes.len() == TOKEN_BYTES && URL_SAFE_NO_PAD.encode(&bytes) == input,
            Err(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({}…)", &self.0[..6])
    }
}

impl FromStr for AccessToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessToken::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AccessToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AccessToken {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AccessToken::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_produces_canonical_token() {
        let token = AccessToken::generate();
        let s = token.to_string();

        assert_eq!(s.len(), TOKEN_LEN);
        assert!(AccessToken::is_canonical(&s));
        assert_eq!(AccessToken::parse(&s).unwrap(), token);
    }

    #[test]
    fn test_generate_is_unique_over_ten_thousand_tokens() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(AccessToken::generate()), "duplicate token generated");
        }
    }

    #[test]
    fn test_parse_rejects_padded_token() {
        let token = AccessToken::generate().to_string();
        assert!(AccessToken::parse(&format!("{token}=")).is_err());
    }

    #[test]
    fn test_parse_rejects_standard_alphabet() {
        let token = AccessToken::generate().to_string();
        let with_plus = format!("+{}", &token[1..]);
        assert!(AccessToken::parse(&with_plus).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(AccessToken::parse("").is_err());
        assert!(AccessToken::parse("abc").is_err());
        let token = AccessToken::generate().to_string();
        assert!(AccessToken::parse(&token[..TOKEN_LEN - 1]).is_err());
    }

    #[test]
    fn test_parse_rejects_non_zero_trailing_bits() {
        // 43 chars of 'B' decode fine as a prefix but the last sextet carries stray low bits.
        let stray = "B".repeat(TOKEN_LEN);
        assert!(!AccessToken::is_canonical(&stray));
    }

    #[test]
    fn test_debug_does_not_reveal_full_token() {
        let token = AccessToken::generate();
        let debug = format!("{token:?}");
        assert!(!debug.contains(token.as_str()));
        assert!(debug.starts_with("AccessToken("));
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let token = AccessToken::generate();
        let json = serde_json::to_string(&token).unwrap();
        let back: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert!(serde_json::from_str::<AccessToken>("\"short\"").is_err());
    }
}
