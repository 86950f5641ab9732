//! Keycloak-style token verification settings.

use std::time::Duration;

use mockable::Env;
use tracing::warn;

use super::ConfigError;
use crate::utils::env::{get_env, get_env_list};
use crate::utils::time::{DurationParseError, parse_duration};

const FALLBACK_DURATION: Duration = Duration::from_secs(3600);

/// Token verification settings read from `KEYCLOAK_*` variables.
///
/// Either a static public key or a JWKS endpoint (URL plus realm) must be
/// configured for [`AuthConfig::validate`] to pass.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Identity provider base URL.
    pub url: String,
    /// Realm name.
    pub realm: String,
    /// Base64-encoded static public key.
    pub public_key: String,
    /// Claims every token must carry.
    pub required_claims: Vec<String>,
    /// Path prefixes that bypass authentication.
    pub skip_paths: Vec<String>,
    /// How often to refresh signing keys.
    pub key_refresh_interval: Duration,
    /// Timeout for calls to the identity provider.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("url", &self.url)
            .field("realm", &self.realm)
            .field("has_static_key", &self.has_static_key())
            .field("required_claims", &self.required_claims)
            .field("skip_paths", &self.skip_paths)
            .field("key_refresh_interval", &self.key_refresh_interval)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            realm: "master".to_owned(),
            public_key: String::new(),
            required_claims: vec!["sub".to_owned(), "preferred_username".to_owned()],
            skip_paths: vec!["/health".to_owned(), "/metrics".to_owned()],
            key_refresh_interval: FALLBACK_DURATION,
            http_timeout: Duration::from_secs(10),
        }
    }
}

fn duration_from_env<E: Env>(env: &E, key: &str, default: &str) -> Duration {
    let raw = get_env(env, key, default);
    match parse_duration(&raw) {
        Ok(duration) => duration,
        // Zero fails validation, so a negative setting is reported rather than replaced.
        Err(DurationParseError::Negative { .. }) => Duration::ZERO,
        Err(error) => {
            warn!(key, value = %raw, %error, "unparsable duration; using one hour");
            FALLBACK_DURATION
        }
    }
}

impl AuthConfig {
    /// Load from the supplied environment.
    pub fn from_env<E: Env>(env: &E) -> Self {
        Self {
            url: get_env(env, "KEYCLOAK_URL", ""),
            realm: get_env(env, "KEYCLOAK_REALM", "master"),
            public_key: get_env(env, "KEYCLOAK_PUBLIC_KEY", ""),
            required_claims: get_env_list(
                env,
                "KEYCLOAK_REQUIRED_CLAIMS",
                &["sub", "preferred_username"],
            ),
            skip_paths: get_env_list(env, "KEYCLOAK_SKIP_PATHS", &["/health", "/metrics"]),
            key_refresh_interval: duration_from_env(env, "KEYCLOAK_KEY_REFRESH_INTERVAL", "1h"),
            http_timeout: duration_from_env(env, "KEYCLOAK_HTTP_TIMEOUT", "10s"),
        }
    }

    /// Check that a key source is configured and timings are positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.has_static_key() && !self.has_jwks() {
            return Err(ConfigError::invalid(
                "keycloak config must provide either a public key or both URL and realm",
            ));
        }
        if self.key_refresh_interval.is_zero() {
            return Err(ConfigError::invalid("key refresh interval must be positive"));
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::invalid("HTTP timeout must be positive"));
        }
        Ok(())
    }

    /// A static public key is configured.
    #[must_use]
    pub fn has_static_key(&self) -> bool {
        !self.public_key.is_empty()
    }

    /// Both URL and realm are configured.
    #[must_use]
    pub fn has_jwks(&self) -> bool {
        !self.url.is_empty() && !self.realm.is_empty()
    }

    /// Realm certificate endpoint, when JWKS is configured.
    #[must_use]
    pub fn jwks_url(&self) -> Option<String> {
        self.has_jwks().then(|| {
            format!(
                "{}/realms/{}/protocol/openid-connect/certs",
                self.url.trim_end_matches('/'),
                self.realm
            )
        })
    }

    /// Whether `path` equals or starts with a configured skip path.
    #[must_use]
    pub fn should_skip_path(&self, path: &str) -> bool {
        self.skip_paths
            .iter()
            .any(|skip| path == skip || path.starts_with(skip.as_str()))
    }
}
