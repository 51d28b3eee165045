//! Reconciliation error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`ComputeApi`](crate::api::ComputeApi) implementation
///
/// Every variant is a transport-level failure from the reconciler's point of
/// view: the remote call did not produce a usable answer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error ({status}) {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Response decode failed: {0}")]
    Decode(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Request signing failed: {0}")]
    Signing(String),
}

/// Remote prerequisite looked up before instance creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrerequisiteKind {
    Image,
    Network,
}

impl std::fmt::Display for PrerequisiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrerequisiteKind::Image => write!(f, "image"),
            PrerequisiteKind::Network => write!(f, "network"),
        }
    }
}

/// Bootstrap script rendering errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Unknown bootstrap script: {0}")]
    UnknownScript(String),

    #[error("Failed to read bootstrap script {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Template error in {script}: {message}")]
    Template { script: String, message: String },
}

/// Errors surfaced by the reconciler
///
/// Variants tied to a resource carry its name so the orchestrator can report
/// which node failed.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("[{resource}] remote call {operation} failed: {source}")]
    Transport {
        resource: String,
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("[{resource}] no {kind} matches {name}")]
    NotFound {
        resource: String,
        kind: PrerequisiteKind,
        name: String,
    },

    #[error("[{resource}] address discovery exhausted for {id} after {attempts} attempts")]
    AddressDiscoveryExhausted {
        resource: String,
        id: String,
        attempts: u32,
    },

    #[error("[{resource}] address discovery cancelled for {id}")]
    Cancelled { resource: String, id: String },

    #[error("[{resource}] missing identifier, resource does not exist remotely")]
    MissingIdentifier { resource: String },

    #[error("[{resource}] instance {id} differs in {}, refusing to create a duplicate", .fields.join(", "))]
    Drift {
        resource: String,
        id: String,
        fields: Vec<&'static str>,
    },

    #[error("[{resource}] bootstrap script render failed: {source}")]
    Bootstrap {
        resource: String,
        #[source]
        source: BootstrapError,
    },
}

impl ReconcileError {
    /// Name of the resource the error belongs to
    pub fn resource(&self) -> &str {
        match self {
            ReconcileError::Transport { resource, .. }
            | ReconcileError::NotFound { resource, .. }
            | ReconcileError::AddressDiscoveryExhausted { resource, .. }
            | ReconcileError::Cancelled { resource, .. }
            | ReconcileError::MissingIdentifier { resource }
            | ReconcileError::Drift { resource, .. }
            | ReconcileError::Bootstrap { resource, .. } => resource,
        }
    }
}

/// Provisioning configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
