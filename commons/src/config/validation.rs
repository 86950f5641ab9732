//! Aggregating configuration validator.
//!
//! Unlike [`super::Config::validate`], which stops at the first problem,
//! [`validate_config`] reports every offending setting at once so operators
//! can fix a deployment in one pass.

use url::Url;

use super::{Config, ConfigError};

/// One rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Variable name, e.g. `PORT` or `ALLOWED_ORIGINS[1]`.
    pub field: String,
    /// Rejected value.
    pub value: String,
    /// Reason for rejection.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "validation error for field '{}': {}",
            self.field, self.message
        )
    }
}

/// Every failure collected by a [`ConfigValidator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("configuration validation failed:\n  - {}", join_errors(.errors))]
pub struct ValidationErrors {
    /// Failures in the order they were found.
    pub errors: Vec<ValidationError>,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n  - ")
}

/// Chainable collector of configuration checks.
///
/// Empty values pass every check except [`ConfigValidator::required`], so
/// optional settings can be validated without extra guards.
///
/// # Examples
/// ```
/// use service_commons::config::ConfigValidator;
///
/// let mut validator = ConfigValidator::new();
/// validator.required("PORT", "").port("PORT", "80");
/// assert_eq!(validator.errors().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
}

impl ConfigValidator {
    /// Empty validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &str, value: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_owned(),
            value: value.to_owned(),
            message: message.into(),
        });
    }

    /// Reject blank values.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, value, "field is required");
        }
        self
    }

    /// Reject values that are not ports in `1..=65535`.
    pub fn port(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            return self;
        }
        match value.parse::<i64>() {
            Err(_) => self.push(field, value, "must be a valid port number"),
            Ok(port) if !(1..=65535).contains(&port) => {
                self.push(field, value, "port must be between 1 and 65535");
            }
            Ok(_) => {}
        }
        self
    }

    /// Reject values that are not absolute URLs.
    pub fn url(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            return self;
        }
        match Url::parse(value) {
            Ok(_) => {}
            Err(url::ParseError::RelativeUrlWithoutBase) => self.push(
                field,
                value,
                "URL must include scheme (http:// or https://)",
            ),
            Err(_) => self.push(field, value, "must be a valid URL"),
        }
        self
    }

    /// Reject values outside `allowed`.
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !value.is_empty() && !allowed.contains(&value) {
            self.push(
                field,
                value,
                format!("must be one of: {}", allowed.join(", ")),
            );
        }
        self
    }

    /// Reject values that are not integers within `min..=max`.
    pub fn min_max(&mut self, field: &str, value: &str, min: i64, max: i64) -> &mut Self {
        if value.is_empty() {
            return self;
        }
        match value.parse::<i64>() {
            Err(_) => self.push(field, value, "must be a valid number"),
            Ok(number) if number < min || number > max => {
                self.push(field, value, format!("must be between {min} and {max}"));
            }
            Ok(_) => {}
        }
        self
    }

    /// Whether any check failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Failures so far.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Finish validation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] when at least one check failed.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                errors: self.errors,
            })
        }
    }
}

/// Validate the service-level settings of `config`, reporting all failures.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] listing every rejected setting.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut validator = ConfigValidator::new();
    validator
        .required("PORT", &config.port)
        .port("PORT", &config.port)
        .required("SERVICE_NAME", &config.service_name)
        .one_of(
            "ENVIRONMENT",
            &config.environment,
            &["dev", "development", "staging", "prod", "production"],
        )
        .one_of(
            "LOG_LEVEL",
            &config.log_level,
            &["debug", "info", "warn", "error"],
        );
    for (index, origin) in config.allowed_origins.iter().enumerate() {
        validator.url(&format!("ALLOWED_ORIGINS[{index}]"), origin);
    }
    validator.finish().map_err(ConfigError::from)
}
