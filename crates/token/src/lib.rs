//! Questionnaire access tokens.
//!
//! A patient-facing questionnaire link embeds a secret token. Holding the token is the only
//! credential the patient needs, so the token must not be guessable or enumerable within its
//! validity window.
//!
//! This crate provides a small wrapper type ([`AccessToken`]) that *guarantees* the canonical
//! format once constructed.
//!
//! ## Canonical token form
//! - 32 bytes (256 bits) from the operating system CSPRNG
//! - Encoded as URL-safe base64 without padding
//! - Length: 43
//! - Characters: `A-Z`, `a-z`, `0-9`, `-` and `_` only
//!
//! Notes:
//! - Canonical form is *required* for externally supplied tokens (for example, the path segment
//!   of a patient link). Use [`AccessToken::parse`] to validate an input string.
//! - Non-canonical values (padded, standard alphabet, wrong length) are rejected.

mod service;

pub use service::{AccessToken, TOKEN_BYTES, TOKEN_LEN};

/// Error type for token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Invalid input provided
    #[error("Invalid token: {0}")]
    InvalidInput(String),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
