//! Secret references in configuration values.
//!
//! `client_id` and `client_secret` may point outside the config file:
//!
//! - `env::VAR_NAME` reads `$VAR_NAME`
//! - `pass::path/in/store` runs `pass show path/in/store` and keeps the first line
//!
//! Anything else is used verbatim.

use std::process::Command;

use thiserror::Error;

const ENV_PREFIX: &str = "env::";
const PASS_PREFIX: &str = "pass::";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error("failed to run `pass show {path}`: {source}")]
    PassSpawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`pass show {path}` failed ({status}): {stderr}")]
    PassFailed {
        path: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`pass show {0}` produced no output")]
    PassEmpty(String),
}

/// Expands a value that may hold a secret reference.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    if let Some(var) = value.strip_prefix(ENV_PREFIX) {
        std::env::var(var).map_err(|_| SecretError::MissingEnv(var.to_string()))
    } else if let Some(path) = value.strip_prefix(PASS_PREFIX) {
        resolve_pass(path)
    } else {
        Ok(value.to_string())
    }
}

/// Returns true when `value` is resolved from somewhere else.
pub fn is_reference(value: &str) -> bool {
    value.starts_with(ENV_PREFIX) || value.starts_with(PASS_PREFIX)
}

fn resolve_pass(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .arg("show")
        .arg(path)
        .output()
        .map_err(|source| SecretError::PassSpawn {
            path: path.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(resolve("").unwrap(), "");
        assert_eq!(
            resolve("00000000-0000-0000-0000-000000000000").unwrap(),
            "00000000-0000-0000-0000-000000000000"
        );
        assert!(!is_reference("plain"));
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_NEXTEVENT_TEST_SECRET", "from-env");
        }
        assert!(is_reference("env::_NEXTEVENT_TEST_SECRET"));
        assert_eq!(resolve("env::_NEXTEVENT_TEST_SECRET").unwrap(), "from-env");
        unsafe {
            std::env::remove_var("_NEXTEVENT_TEST_SECRET");
        }
    }

    #[test]
    fn missing_env_reference() {
        let err = resolve("env::_NEXTEVENT_UNSET_VAR_4242").unwrap_err();
        assert!(matches!(err, SecretError::MissingEnv(ref v) if v == "_NEXTEVENT_UNSET_VAR_4242"));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn unknown_pass_entry() {
        // Fails whether or not `pass` is installed.
        assert!(resolve("pass::nextevent/does/not/exist/4242").is_err());
    }
}
