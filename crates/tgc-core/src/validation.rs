//! Identifier normalization.
//!
//! Pure functions: no I/O, no session access. Both return
//! `Error::InvalidFormat` with the offending (normalized) value on rejection.

use std::sync::OnceLock;

use regex::Regex;

use crate::{
    domain::{Identifier, IdentifierKind, Phone, Username},
    errors::Error,
    Result,
};

static PHONE_RE: OnceLock<Regex> = OnceLock::new();
static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn phone_re() -> &'static Regex {
    PHONE_RE.get_or_init(|| Regex::new(r"^\+\d{10,15}$").expect("valid regex"))
}

fn username_re() -> &'static Regex {
    USERNAME_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{3,30}[A-Za-z0-9]$").expect("valid regex"))
}

/// Normalize a phone number to `+<10-15 digits>`.
///
/// Separators (spaces, dashes, parentheses, dots) are dropped; a `+` survives
/// only in leading position. Any letter rejects the input outright.
pub fn validate_phone(raw: &str) -> Result<Phone> {
    let trimmed = raw.trim();
    if trimmed.chars().any(char::is_alphabetic) {
        return Err(Error::InvalidFormat(format!(
            "invalid phone number format: {trimmed}"
        )));
    }

    let mut normalized = String::with_capacity(trimmed.len() + 1);
    normalized.push('+');
    normalized.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));

    if !phone_re().is_match(&normalized) {
        return Err(Error::InvalidFormat(format!(
            "invalid phone number format: {normalized}"
        )));
    }
    Ok(Phone::new_unchecked(normalized))
}

/// Normalize a username: surrounding whitespace and one leading `@` are
/// stripped, then 5-32 chars starting with a letter, ending with a letter or
/// digit, with letters/digits/underscore in between.
pub fn validate_username(raw: &str) -> Result<Username> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

    if !username_re().is_match(name) {
        return Err(Error::InvalidFormat(format!(
            "invalid username format: {name}"
        )));
    }
    Ok(Username::new_unchecked(name.to_string()))
}

pub fn validate(raw: &str, kind: IdentifierKind) -> Result<Identifier> {
    match kind {
        IdentifierKind::Phone => validate_phone(raw).map(Identifier::Phone),
        IdentifierKind::Username => validate_username(raw).map(Identifier::Username),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_strips_separators_and_prefixes_plus() {
        assert_eq!(
            validate_phone(" +1 (555) 123-4567 ").unwrap().as_str(),
            "+15551234567"
        );
        assert_eq!(validate_phone("15551234567").unwrap().as_str(), "+15551234567");
    }

    #[test]
    fn phone_is_idempotent_on_normalized_input() {
        let once = validate_phone("+44 20 7946 0958").unwrap();
        let twice = validate_phone(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn phone_digit_count_bounds() {
        assert!(validate_phone(&format!("+{}", "1".repeat(9))).is_err());
        assert!(validate_phone(&format!("+{}", "1".repeat(10))).is_ok());
        assert!(validate_phone(&format!("+{}", "1".repeat(15))).is_ok());
        assert!(validate_phone(&format!("+{}", "1".repeat(16))).is_err());
    }

    #[test]
    fn phone_with_letters_fails() {
        for raw in ["bad_phone_x", "+1555abc4567890", "1555123456x", "+"] {
            let err = validate_phone(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidFormat(_)), "{raw}");
        }
    }

    #[test]
    fn phone_drops_inner_plus() {
        assert_eq!(
            validate_phone("+1555+1234567").unwrap().as_str(),
            "+15551234567"
        );
    }

    #[test]
    fn username_strips_at_and_whitespace() {
        assert_eq!(
            validate_username("  @Valid_Username1 ").unwrap().as_str(),
            "Valid_Username1"
        );
        assert_eq!(
            validate_username("Valid_Username1").unwrap().as_str(),
            "Valid_Username1"
        );
    }

    #[test]
    fn username_length_bounds() {
        assert!(validate_username("Abc1").is_err());
        assert!(validate_username("Abcd1").is_ok());
        assert!(validate_username(&format!("a{}", "b".repeat(31))).is_ok());
        assert!(validate_username(&format!("a{}", "b".repeat(32))).is_err());
        // five characters including the underscore is the shortest legal form
        assert_eq!(validate_username("@Ab_12").unwrap().as_str(), "Ab_12");
    }

    #[test]
    fn username_shape_rules() {
        // must start with a letter
        assert!(validate_username("1abcde").is_err());
        assert!(validate_username("_abcde").is_err());
        // must not end with underscore
        assert!(validate_username("abcde_").is_err());
        // no punctuation inside
        assert!(validate_username("abc.def").is_err());
        assert!(validate_username("abc-def").is_err());
        // only one leading @ is stripped
        assert!(validate_username("@@abcdef").is_err());
    }

    #[test]
    fn validate_dispatches_on_kind() {
        assert!(matches!(
            validate("+15551234567", IdentifierKind::Phone),
            Ok(Identifier::Phone(_))
        ));
        assert!(matches!(
            validate("@durov_bot", IdentifierKind::Username),
            Ok(Identifier::Username(_))
        ));
        assert!(validate("durov", IdentifierKind::Phone).is_err());
    }
}
