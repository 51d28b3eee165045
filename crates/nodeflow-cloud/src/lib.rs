//! NodeFlow Cloud
//!
//! Declarative reconciliation of compute nodes against a remote cloud
//! control plane. Given the desired node configuration and the last cluster
//! state snapshot, a reconcile cycle reads remote truth, compares it with the
//! desired state and issues only the remote operations needed to converge.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             Orchestrator (caller)               │
//! │     owns ClusterState, schedules cycles         │
//! └─────────────────┬───────────────────────────────┘
//!                   │ reconcile()
//! ┌─────────────────▼───────────────────────────────┐
//! │                nodeflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │ NodeReconciler                           │   │
//! │  │ actual / expected / apply / delete       │   │
//! │  └──────┬──────────────┬──────────────┬─────┘   │
//! │  ┌──────▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐  │
//! │  │AddressPoller│ │ Bootstrap  │ │   render   │  │
//! │  └──────┬──────┘ └────────────┘ └────────────┘  │
//! └─────────┼───────────────────────────────────────┘
//!           │ trait ComputeApi
//! ┌─────────▼───────┐
//! │ triton provider │
//! └─────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nodeflow_cloud::{
//!     ClusterState, MemberRole, NodeReconciler, NodeSpec, ProvisionConfig, TemplateRenderer,
//!     reconcile,
//! };
//! use std::sync::Arc;
//!
//! let spec = NodeSpec::new("master-0", MemberRole::ControlPlane)
//!     .with_bootstrap_scripts(["docker_setup.sh", "triton_k8s_master.sh"]);
//! let reconciler = NodeReconciler::new(
//!     spec,
//!     api.clone(),
//!     Arc::new(TemplateRenderer::new()),
//!     ProvisionConfig::load_default()?,
//! );
//!
//! let outcome = reconcile(&reconciler, &ClusterState::new("demo", "6443")).await?;
//! persist(&outcome.reconciled.state)?;
//! ```

pub mod api;
pub mod bootstrap;
pub mod compare;
pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod reconciler;
pub mod render;
pub mod resource;
pub mod state;

// Re-exports
pub use api::{
    ComputeApi, CreateInstanceInput, DeleteInstanceInput, GetInstanceInput, Image, Instance,
    ListImagesInput, ListInstancesInput, Network,
};
pub use bootstrap::{BootstrapRenderer, TemplateRenderer};
pub use compare::Convergence;
pub use config::{PrerequisitePolicy, ProvisionConfig};
pub use error::{ApiError, BootstrapError, ConfigError, PrerequisiteKind, ReconcileError, Result};
pub use model::{MemberRole, NodeSpec, ProvisionedResource};
pub use poller::{AddressPoller, Discovery};
pub use reconciler::NodeReconciler;
pub use resource::{CycleOutcome, Reconciled, Resource, reconcile};
pub use state::{ClusterState, INJECTED_MASTER, INJECTED_PORT, StatePatch};
