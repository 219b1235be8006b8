//! Participant identity resolution.
//!
//! A ballot belongs to a participant key rather than to an account. Two
//! submissions share a key when they carry the same email (compared
//! case-insensitively), or when neither carries an email and the names match
//! case-insensitively. A named-only submission never matches an emailed one,
//! even when the display names are equal.

use std::fmt;

use crate::{AppError, AppResult};

/// Maximum length of a participant display name, in characters.
pub const MAX_NAME_CHARS: usize = 80;

/// Maximum length of a participant email, in characters (RFC 5321 path limit).
pub const MAX_EMAIL_CHARS: usize = 254;

/// Canonical key used to detect repeated voters within one poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParticipantKey {
    /// Normalized (trimmed, lowercased) email address.
    Email(String),
    /// Lowercased display name, for participants without an email.
    Name(String),
}

impl ParticipantKey {
    /// Rebuild the key of a stored ballot row.
    #[must_use]
    pub fn from_stored(name: &str, email: Option<&str>) -> Self {
        match normalize_email(email) {
            Some(email) => Self::Email(email),
            None => Self::Name(normalize_name(name).to_lowercase()),
        }
    }

    /// Whether this key was derived from an email address.
    #[must_use]
    pub const fn is_email(&self) -> bool {
        matches!(self, Self::Email(_))
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email(email) => write!(f, "email:{email}"),
            Self::Name(name) => write!(f, "name:{name}"),
        }
    }
}

/// A resolved participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Display name, trimmed and truncated, original casing kept.
    pub name: String,
    /// Normalized email, if one was supplied.
    pub email: Option<String>,
    /// Identity key.
    pub key: ParticipantKey,
}

/// Trim and lowercase an email. Blank input counts as absent.
#[must_use]
pub fn normalize_email(email: Option<&str>) -> Option<String> {
    email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

/// Trim a display name and cap it at [`MAX_NAME_CHARS`] characters.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    clip_text(name, MAX_NAME_CHARS)
}

/// Trim free text and cap it at `max_chars` characters.
///
/// Over-long input is truncated, never rejected.
#[must_use]
pub fn clip_text(text: &str, max_chars: usize) -> String {
    text.trim()
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Resolve a submitted name and optional email into a participant.
///
/// The name is mandatory even when an email is present. Emails longer than
/// [`MAX_EMAIL_CHARS`] are rejected, never truncated.
pub fn resolve_participant(name: &str, email: Option<&str>) -> AppResult<Participant> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(AppError::Validation(
            "Participant name is required".to_string(),
        ));
    }

    let email = normalize_email(email);
    if let Some(email) = &email
        && email.chars().count() > MAX_EMAIL_CHARS
    {
        return Err(AppError::Validation(format!(
            "Email must be at most {MAX_EMAIL_CHARS} characters"
        )));
    }

    let key = match &email {
        Some(email) => ParticipantKey::Email(email.clone()),
        None => ParticipantKey::Name(name.to_lowercase()),
    };

    Ok(Participant { name, email, key })
}
