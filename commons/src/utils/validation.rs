//! Field validators and a collector for their failures.

use std::path::Path;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$").ok()
});
static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{3,30}$").ok());
static SLUG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-+[a-z0-9]+)*$").ok());

fn pattern_matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

/// A single failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as presented to the client.
    pub field: String,
    /// Offending value.
    pub value: String,
    /// Human-readable reason.
    pub message: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FieldError {}

/// Accumulates [`FieldError`]s across several checks.
///
/// # Examples
/// ```
/// use service_commons::utils::validation::{is_valid_email, Validator};
///
/// let mut validator = Validator::new();
/// validator.check("email", "nope", is_valid_email, "must be a valid email");
/// assert!(validator.has_errors());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    /// Empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure.
    pub fn add_error(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldError {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        });
    }

    /// Run `rule` on `value`, recording `message` when it fails.
    pub fn check<F>(&mut self, field: &str, value: &str, rule: F, message: &str) -> &mut Self
    where
        F: Fn(&str) -> bool,
    {
        if !rule(value) {
            self.add_error(field, value, message);
        }
        self
    }

    /// Whether any check failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded failures in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Forget all failures.
    pub fn clear(&mut self) {
        self.errors.clear();
    }

    /// Consume the validator, yielding the failures when there are any.
    ///
    /// # Errors
    ///
    /// Returns every recorded [`FieldError`] when at least one check failed.
    pub fn finish(self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Run every rule against `value`, producing one generic failure per
/// rejected rule.
pub fn validate_field(field: &str, value: &str, rules: &[&dyn Fn(&str) -> bool]) -> Vec<FieldError> {
    rules
        .iter()
        .filter(|rule| !rule(value))
        .map(|_| FieldError {
            field: field.to_owned(),
            value: value.to_owned(),
            message: "Validation failed".to_owned(),
        })
        .collect()
}

/// Rule: at least `min` characters.
pub fn min_length(min: usize) -> impl Fn(&str) -> bool {
    move |value: &str| value.chars().count() >= min
}

/// Rule: at most `max` characters.
pub fn max_length(max: usize) -> impl Fn(&str) -> bool {
    move |value: &str| value.chars().count() <= max
}

/// Rule: exactly `len` characters.
pub fn exact_length(len: usize) -> impl Fn(&str) -> bool {
    move |value: &str| value.chars().count() == len
}

/// Rule: matches `pattern`.
///
/// # Errors
///
/// Returns the regex compilation error for an invalid pattern.
pub fn matches_pattern(pattern: &str) -> Result<impl Fn(&str) -> bool + use<>, regex::Error> {
    let re = Regex::new(pattern)?;
    Ok(move |value: &str| re.is_match(value))
}

/// Rule: not blank.
pub fn not_empty() -> impl Fn(&str) -> bool {
    |value: &str| !value.trim().is_empty()
}

/// Plausible `local@domain.tld` address.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    pattern_matches(&EMAIL, value.trim())
}

/// Absolute URL with both scheme and host.
#[must_use]
pub fn is_valid_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|parsed| parsed.has_host())
}

/// 10 to 15 digits once spaces, dashes, parentheses and `+` are removed.
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    let digits: Vec<char> = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '+'))
        .collect();
    (10..=15).contains(&digits.len()) && digits.iter().all(char::is_ascii_digit)
}

/// At least eight characters mixing upper case, lower case, digits and a
/// symbol.
#[must_use]
pub fn is_strong_password(value: &str) -> bool {
    value.chars().count() >= 8
        && value.chars().any(char::is_uppercase)
        && value.chars().any(char::is_lowercase)
        && value.chars().any(|c| c.is_ascii_digit())
        && value
            .chars()
            .any(|c| c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()))
}

/// 3 to 30 ASCII letters, digits, `_` or `-`.
#[must_use]
pub fn is_valid_username(value: &str) -> bool {
    pattern_matches(&USERNAME, value)
}

/// Lowercase letters and digits separated by hyphens, without leading or
/// trailing hyphens.
#[must_use]
pub fn is_valid_slug(value: &str) -> bool {
    pattern_matches(&SLUG, value)
}

/// Hyphenated UUID of any version.
#[must_use]
pub fn is_valid_uuid(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::parse_str(value).is_ok()
}

/// Luhn checksum over 13 to 19 digits; spaces and dashes are ignored.
#[must_use]
pub fn is_valid_credit_card(value: &str) -> bool {
    let cleaned: Vec<char> = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !(13..=19).contains(&cleaned.len()) {
        return false;
    }
    let mut sum = 0_u32;
    for (index, c) in cleaned.iter().rev().enumerate() {
        let Some(digit) = c.to_digit(10) else {
            return false;
        };
        let contribution = if index % 2 == 1 {
            let doubled = digit * 2;
            if doubled > 9 { doubled - 9 } else { doubled }
        } else {
            digit
        };
        sum += contribution;
    }
    sum % 10 == 0
}

/// Dotted-quad IPv4 address.
#[must_use]
pub fn is_valid_ipv4(value: &str) -> bool {
    value.parse::<std::net::Ipv4Addr>().is_ok()
}

/// Port number between 1 and 65535.
#[must_use]
pub fn is_valid_port(value: &str) -> bool {
    value.parse::<u16>().is_ok_and(|port| port > 0)
}

/// Letters and digits only (any script).
#[must_use]
pub fn is_alphanumeric(value: &str) -> bool {
    value.chars().all(char::is_alphanumeric)
}

/// Letters only (any script).
#[must_use]
pub fn is_alphabetic(value: &str) -> bool {
    value.chars().all(char::is_alphabetic)
}

/// Parses as a floating-point number.
#[must_use]
pub fn is_numeric(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}

/// Parses as a signed integer.
#[must_use]
pub fn is_integer(value: &str) -> bool {
    value.parse::<i64>().is_ok()
}

/// Character count within `min..=max`.
#[must_use]
pub fn is_valid_length(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.chars().count())
}

/// `value` within `min..=max`.
#[must_use]
pub fn is_in_range(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

/// Extension (case-insensitive) in `allowed`; an empty list allows anything.
#[must_use]
pub fn has_valid_extension(filename: &str, allowed: &[&str]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    allowed
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(extension))
}

/// Parses as JSON.
#[must_use]
pub fn is_valid_json(value: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(value).is_ok()
}

/// Standard padded base64.
#[must_use]
pub fn is_valid_base64(value: &str) -> bool {
    STANDARD.decode(value).is_ok()
}

/// Even-length hexadecimal.
#[must_use]
pub fn is_valid_hex(value: &str) -> bool {
    hex::decode(value).is_ok()
}

/// Parses with the `chrono` format string `format`, as a date or a
/// timestamp.
#[must_use]
pub fn is_valid_date(value: &str, format: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, format).is_ok()
        || NaiveDateTime::parse_from_str(value, format).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("user@example.com", true)]
    #[case("first.last+tag@sub.example.org", true)]
    #[case("no-at-sign", false)]
    #[case("user@localhost", false)]
    #[case("", false)]
    fn emails(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_email(input), expected);
    }

    #[rstest]
    #[case("https://example.com/path", true)]
    #[case("http://localhost:3000", true)]
    #[case("example.com", false)]
    #[case("mailto:user@example.com", false)]
    fn urls(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_url(input), expected);
    }

    #[rstest]
    #[case("+1 (555) 123-4567", true)]
    #[case("12345", false)]
    #[case("555-CALL-NOW", false)]
    fn phones(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_phone(input), expected);
    }

    #[rstest]
    #[case("Sup3r$ecret", true)]
    #[case("password", false)]
    #[case("Short1!", false)]
    #[case("NoDigits!!", false)]
    fn passwords(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_strong_password(input), expected);
    }

    #[rstest]
    #[case("john_doe", true)]
    #[case("ab", false)]
    #[case("has space", false)]
    fn usernames(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_username(input), expected);
    }

    #[rstest]
    #[case("hello-world", true)]
    #[case("-leading", false)]
    #[case("trailing-", false)]
    #[case("Upper", false)]
    #[case("", false)]
    fn slugs(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_slug(input), expected);
    }

    #[rstest]
    #[case("4532015112830366", true)]
    #[case("4532-0151-1283-0366", true)]
    #[case("4532015112830367", false)]
    #[case("1234", false)]
    fn luhn(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_valid_credit_card(input), expected);
    }

    #[rstest]
    fn scalar_checks() {
        assert!(is_valid_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_uuid("550e8400e29b41d4a716446655440000"));
        assert!(is_valid_ipv4("192.168.0.1"));
        assert!(!is_valid_ipv4("256.0.0.1"));
        assert!(is_valid_port("8080"));
        assert!(!is_valid_port("0"));
        assert!(!is_valid_port("70000"));
        assert!(is_valid_json(r#"{"a": 1}"#));
        assert!(!is_valid_json("{a}"));
        assert!(is_valid_base64("aGVsbG8="));
        assert!(is_valid_hex("deadbeef"));
        assert!(!is_valid_hex("abc"));
        assert!(is_valid_date("2024-02-29", "%Y-%m-%d"));
        assert!(!is_valid_date("2023-02-29", "%Y-%m-%d"));
        assert!(has_valid_extension("photo.JPG", &["jpg", "png"]));
        assert!(!has_valid_extension("script.sh", &["jpg"]));
        assert!(is_integer("-12"));
        assert!(is_numeric("1.5"));
        assert!(is_alphabetic("abc"));
        assert!(!is_alphanumeric("a-b"));
    }

    #[rstest]
    fn field_rules_report_each_failure() {
        let errors = validate_field("name", "ab", &[&min_length(3), &max_length(1), &not_empty()]);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.field == "name"));
        assert!(exact_length(2)("ab"));
    }

    #[rstest]
    fn pattern_rules_compile_lazily() {
        let rule = matches_pattern(r"^\d+$").expect("valid pattern");
        assert!(rule("123"));
        assert!(matches_pattern("(").is_err());
    }

    #[rstest]
    fn validator_collects_failures() {
        let mut validator = Validator::new();
        validator
            .check("email", "bad", is_valid_email, "must be a valid email")
            .check("username", "ok_name", is_valid_username, "invalid username");
        assert_eq!(validator.errors().len(), 1);
        let errors = validator.clone().finish().expect_err("has failures");
        assert_eq!(errors[0].message, "must be a valid email");
        validator.clear();
        assert!(validator.finish().is_ok());
    }
}
