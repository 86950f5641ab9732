//! Environment lookups with defaults.
//!
//! All helpers read through [`mockable::Env`] so callers can substitute a
//! `MockEnv` in tests. Empty values are treated the same as unset ones.

use std::str::FromStr;

use mockable::Env;
use tracing::warn;

use super::strings::split_and_trim;

/// Read `key`, falling back to `default` when unset or empty.
pub fn get_env<E: Env>(env: &E, key: &str, default: &str) -> String {
    env.string(key)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Read and parse `key`, falling back to `default` when unset, empty or
/// unparsable.
pub fn get_env_parsed<E: Env, T: FromStr>(env: &E, key: &str, default: T) -> T {
    match env.string(key).filter(|value| !value.trim().is_empty()) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparsable environment value");
            default
        }),
        None => default,
    }
}

/// Read `key` as a signed integer, falling back to `default`.
pub fn get_env_int<E: Env>(env: &E, key: &str, default: i64) -> i64 {
    get_env_parsed(env, key, default)
}

/// Read a comma-separated list, trimming entries and dropping empty ones.
/// Returns `default` when the variable is unset or yields no entries.
pub fn get_env_list<E: Env>(env: &E, key: &str, default: &[&str]) -> Vec<String> {
    let parsed = env
        .string(key)
        .map(|raw| split_and_trim(&raw, ","))
        .unwrap_or_default();
    if parsed.is_empty() {
        default.iter().map(|item| (*item).to_owned()).collect()
    } else {
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::MockEnv;
    use rstest::rstest;
    use std::collections::HashMap;

    fn mock_env(vars: &[(&str, &str)]) -> MockEnv {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        let mut env = MockEnv::new();
        env.expect_string()
            .times(0..)
            .returning(move |key| vars.get(key).cloned());
        env
    }

    #[rstest]
    fn empty_value_uses_default() {
        let env = mock_env(&[("HOST", "")]);
        assert_eq!(get_env(&env, "HOST", "localhost"), "localhost");
        assert_eq!(get_env(&env, "MISSING", "x"), "x");
    }

    #[rstest]
    #[case("42", 42)]
    #[case(" 7 ", 7)]
    #[case("many", 10)]
    #[case("", 10)]
    fn parsed_values_fall_back(#[case] raw: &str, #[case] expected: u32) {
        let env = mock_env(&[("COUNT", raw)]);
        assert_eq!(get_env_parsed(&env, "COUNT", 10_u32), expected);
    }

    #[rstest]
    fn integers_accept_negative_values() {
        let env = mock_env(&[("OFFSET", "-3"), ("BROKEN", "3.5")]);
        assert_eq!(get_env_int(&env, "OFFSET", 0), -3);
        assert_eq!(get_env_int(&env, "BROKEN", 9), 9);
    }

    #[rstest]
    fn lists_are_trimmed() {
        let env = mock_env(&[("ORIGINS", " a , ,b,")]);
        assert_eq!(get_env_list(&env, "ORIGINS", &["z"]), vec!["a", "b"]);
    }

    #[rstest]
    fn empty_list_uses_default() {
        let env = mock_env(&[("ORIGINS", " , ")]);
        assert_eq!(get_env_list(&env, "ORIGINS", &["z"]), vec!["z"]);
    }
}
