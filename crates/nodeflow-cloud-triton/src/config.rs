//! Triton account configuration

use crate::auth::KeySource;
use crate::error::{Result, TritonError};

pub const DEFAULT_URL: &str = "https://us-east-1.api.joyent.com";

/// Connection settings for a Triton CloudAPI endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TritonConfig {
    pub url: String,
    pub account: String,

    /// Sub-user name, if the key belongs to one
    pub user: Option<String>,

    /// Key fingerprint (MD5 hex, e.g. `f7:75:b3:...`)
    pub key_id: String,

    /// Key file path or inline key; the SSH agent is used when absent
    pub key_material: Option<String>,
}

impl TritonConfig {
    pub fn new(
        url: impl Into<String>,
        account: impl Into<String>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            account: account.into(),
            user: None,
            key_id: key_id.into(),
            key_material: None,
        }
    }

    /// Create TritonConfig from environment variables
    ///
    /// `TRITON_ACCOUNT` and `TRITON_KEY_ID` are required; `TRITON_URL`,
    /// `TRITON_USER` and `TRITON_KEY_MATERIAL` are optional.
    pub fn from_env() -> Result<Self> {
        let account = required_env("TRITON_ACCOUNT")?;
        let key_id = required_env("TRITON_KEY_ID")?;
        let url = optional_env("TRITON_URL").unwrap_or_else(|| DEFAULT_URL.to_string());

        Ok(Self {
            url,
            account,
            user: optional_env("TRITON_USER"),
            key_id,
            key_material: optional_env("TRITON_KEY_MATERIAL"),
        })
    }

    pub fn key_source(&self) -> Result<KeySource> {
        KeySource::resolve(self.key_material.as_deref())
    }

    /// `keyId` path used in request signatures
    pub fn key_path(&self) -> String {
        match &self.user {
            Some(user) => format!("/{}/users/{}/keys/{}", self.account, user, self.key_id),
            None => format!("/{}/keys/{}", self.account, self.key_id),
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    optional_env(name).ok_or_else(|| TritonError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("TRITON_ACCOUNT", Some("acme")),
                ("TRITON_KEY_ID", Some("f7:75:b3")),
                ("TRITON_URL", Some("https://eu-ams-1.api.example.com")),
                ("TRITON_USER", Some("deploy")),
                ("TRITON_KEY_MATERIAL", None),
            ],
            || {
                let config = TritonConfig::from_env().unwrap();

                assert_eq!(config.account, "acme");
                assert_eq!(config.url, "https://eu-ams-1.api.example.com");
                assert_eq!(config.key_path(), "/acme/users/deploy/keys/f7:75:b3");
                assert!(config.key_source().unwrap().is_agent());
            },
        );
    }

    #[test]
    #[serial]
    fn test_url_defaults() {
        temp_env::with_vars(
            [
                ("TRITON_ACCOUNT", Some("acme")),
                ("TRITON_KEY_ID", Some("f7:75:b3")),
                ("TRITON_URL", None),
                ("TRITON_USER", None),
            ],
            || {
                let config = TritonConfig::from_env().unwrap();

                assert_eq!(config.url, DEFAULT_URL);
                assert_eq!(config.key_path(), "/acme/keys/f7:75:b3");
            },
        );
    }

    #[test]
    #[serial]
    fn test_missing_key_id() {
        temp_env::with_vars(
            [("TRITON_ACCOUNT", Some("acme")), ("TRITON_KEY_ID", None)],
            || {
                let result = TritonConfig::from_env();
                assert!(matches!(result, Err(TritonError::MissingEnvVar(ref v)) if v == "TRITON_KEY_ID"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_blank_account_is_missing() {
        temp_env::with_vars(
            [("TRITON_ACCOUNT", Some(" ")), ("TRITON_KEY_ID", Some("f7"))],
            || {
                let result = TritonConfig::from_env();
                assert!(matches!(result, Err(TritonError::MissingEnvVar(ref v)) if v == "TRITON_ACCOUNT"));
            },
        );
    }
}
