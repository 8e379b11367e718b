//! Input validation shared by the registration and profile-editing flows.

use crate::error::{DomainError, DomainResult};

pub const NICK_MIN: usize = 4;
pub const NICK_MAX: usize = 20;
pub const ABOUT_MIN: usize = 3;
pub const ABOUT_MAX: usize = 300;

/// Validates a nick against `[a-z0-9_]{4,20}` (case-insensitive) and
/// returns its canonical lowercase form.
pub fn normalize_nick(raw: &str) -> DomainResult<String> {
    let nick = raw.trim().to_lowercase();
    let len = nick.chars().count();
    if len < NICK_MIN || len > NICK_MAX {
        return Err(DomainError::validation(format!(
            "nick must be {NICK_MIN}-{NICK_MAX} characters, got {len}"
        )));
    }
    if !nick
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(DomainError::validation(
            "nick may only contain letters, digits and underscores",
        ));
    }
    Ok(nick)
}

/// Validates bio text length (3 to 300 characters) and returns it trimmed.
pub fn validate_about(raw: &str) -> DomainResult<String> {
    let about = raw.trim();
    let len = about.chars().count();
    if len < ABOUT_MIN || len > ABOUT_MAX {
        return Err(DomainError::validation(format!(
            "about must be {ABOUT_MIN}-{ABOUT_MAX} characters, got {len}"
        )));
    }
    Ok(about.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_too_short_is_rejected() {
        assert!(normalize_nick("abc").is_err());
    }

    #[test]
    fn nick_is_lowercased() {
        assert_eq!(normalize_nick("Abcd_1").unwrap(), "abcd_1");
    }

    #[test]
    fn nick_with_punctuation_is_rejected() {
        assert!(normalize_nick("ab-cd").is_err());
        assert!(normalize_nick("ab cd").is_err());
    }

    #[test]
    fn nick_at_both_bounds_is_accepted() {
        assert!(normalize_nick("abcd").is_ok());
        assert!(normalize_nick(&"a".repeat(20)).is_ok());
        assert!(normalize_nick(&"a".repeat(21)).is_err());
    }

    #[test]
    fn about_bounds_are_inclusive() {
        assert!(validate_about("hi").is_err());
        assert!(validate_about("hey").is_ok());
        assert!(validate_about(&"x".repeat(300)).is_ok());
        assert!(validate_about(&"x".repeat(301)).is_err());
    }

    #[test]
    fn about_counts_characters_not_bytes() {
        // Three Cyrillic characters: 6 bytes, 3 chars.
        assert!(validate_about("привет").is_ok());
        assert!(validate_about("пр").is_err());
    }
}
