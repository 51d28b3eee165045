//! Remote compute API facade
//!
//! The reconciler reaches the cloud control plane only through
//! [`ComputeApi`]. Implementations are constructed once and shared via
//! `Arc` by every reconciler in the process.

use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Compute control-plane operations used by reconciliation
///
/// Implementations hold no mutable state beyond their connection and must be
/// safe to call concurrently for independent instances.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Fetch one instance by id
    async fn get_instance(&self, input: &GetInstanceInput) -> Result<Instance, ApiError>;

    /// Create an instance; the returned view usually has no addresses yet
    async fn create_instance(&self, input: &CreateInstanceInput) -> Result<Instance, ApiError>;

    /// List instances, optionally filtered by name
    async fn list_instances(&self, input: &ListInstancesInput) -> Result<Vec<Instance>, ApiError>;

    /// Delete an instance by id
    async fn delete_instance(&self, input: &DeleteInstanceInput) -> Result<(), ApiError>;

    /// List images matching name and version
    async fn list_images(&self, input: &ListImagesInput) -> Result<Vec<Image>, ApiError>;

    /// List every network visible to the account
    async fn list_networks(&self) -> Result<Vec<Network>, ApiError>;
}

/// Read-only view of a remote instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,

    /// Network addresses, empty until the instance has booted far enough
    #[serde(default)]
    pub ips: Vec<String>,

    /// User tags, provider-reserved tags excluded
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Service-grouping names the instance is registered under
    #[serde(default)]
    pub services: Vec<String>,

    /// Provider lifecycle state (e.g. "provisioning", "running")
    #[serde(default)]
    pub state: Option<String>,
}

impl Instance {
    pub fn primary_ip(&self) -> Option<&str> {
        self.ips.first().map(String::as_str)
    }

    pub fn is_running(&self) -> bool {
        self.state.as_deref() == Some("running")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetInstanceInput {
    pub id: String,
}

impl GetInstanceInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Input for instance creation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateInstanceInput {
    pub name: String,

    /// Package (size) identifier
    pub package: String,

    /// Image id
    pub image: String,

    /// Network ids, in attachment order
    pub networks: Vec<String>,

    /// Instance metadata (e.g. `user-script`)
    pub metadata: BTreeMap<String, String>,

    pub tags: BTreeMap<String, String>,

    /// Service-grouping names (DNS service discovery)
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListInstancesInput {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteInstanceInput {
    pub id: String,
}

impl DeleteInstanceInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListImagesInput {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

/// Run a remote call under an optional deadline
pub async fn with_timeout<T, F>(limit: Option<Duration>, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ApiError::Timeout(limit))?,
        None => call.await,
    }
}
