//! Provisioning configuration
//!
//! Fixed values used when creating a node (package, image, networks) and the
//! address polling limits. Defaults reproduce the values NodeFlow has always
//! used; a YAML file can override any of them.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "nodeflow";
const CONFIG_FILE: &str = "provision.yaml";

/// What to do when an image or network lookup finds no match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrerequisitePolicy {
    /// Fail before creating the instance
    #[default]
    FailFast,
    /// Pass an empty reference to create and let the remote side decide
    Degrade,
}

/// Provisioning settings for node creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Package (instance size) name
    pub package: String,

    pub image_name: String,
    pub image_version: String,

    /// Public network attached first
    pub public_network: String,

    /// Private fabric network attached second
    pub fabric_network: String,

    /// Address polling attempt ceiling
    pub poll_attempts: u32,

    /// Seconds between polling attempts
    pub poll_interval_secs: u64,

    /// Per-request deadline in seconds, unbounded when absent
    pub request_timeout_secs: Option<u64>,

    pub prerequisite_policy: PrerequisitePolicy,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            package: "k4-highcpu-kvm-1.75G".to_string(),
            image_name: "ubuntu-certified-16.04".to_string(),
            image_version: "20180222".to_string(),
            public_network: "Joyent-SDC-Public".to_string(),
            fabric_network: "My-Fabric-Network".to_string(),
            poll_attempts: 100,
            poll_interval_secs: 5,
            request_timeout_secs: Some(60),
            prerequisite_policy: PrerequisitePolicy::FailFast,
        }
    }
}

impl ProvisionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ProvisionConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded provisioning config");
        Ok(config)
    }

    /// Load `~/.config/nodeflow/provision.yaml`, or defaults when it is absent
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        if !path.exists() {
            tracing::debug!("Provisioning config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_attempts == 0 {
            return Err(ConfigError::Invalid(
                "poll_attempts must be at least 1".to_string(),
            ));
        }
        let required = [
            ("package", &self.package),
            ("image_name", &self.image_name),
            ("image_version", &self.image_version),
            ("public_network", &self.public_network),
            ("fabric_network", &self.fabric_network),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

/// Path of the user-level provisioning config
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let dir = dirs::config_dir().ok_or(ConfigError::ConfigDirNotFound)?;
    Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
}
