//! Triton provider for NodeFlow
//!
//! This crate implements the `ComputeApi` facade for Joyent Triton
//! CloudAPI, enabling NodeFlow to create, inspect and delete machines.
//!
//! # Features
//!
//! - Machine lookup, creation and deletion
//! - Image and network resolution
//! - CNS service tagging (`triton.cns.services`)
//!
//! # Requirements
//!
//! - `TRITON_ACCOUNT` and `TRITON_KEY_ID` must be set
//! - `TRITON_KEY_MATERIAL` naming an RSA key (PKCS#1 or PKCS#8 PEM), or a
//!   [`RequestSigner`] backed by the SSH agent
//!
//! # Example
//!
//! ```ignore
//! use nodeflow_cloud::{MemberRole, NodeReconciler, NodeSpec, ProvisionConfig, TemplateRenderer};
//! use nodeflow_cloud_triton::TritonClient;
//! use std::sync::Arc;
//!
//! let api = Arc::new(TritonClient::from_env()?);
//! let spec = NodeSpec::new("master-0", MemberRole::ControlPlane);
//! let reconciler = NodeReconciler::new(
//!     spec,
//!     api,
//!     Arc::new(TemplateRenderer::new()),
//!     ProvisionConfig::load_default()?,
//! );
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;

pub use auth::{KeySource, PrivateKeySigner, RequestSigner, authorization_header};
pub use client::TritonClient;
pub use config::{DEFAULT_URL, TritonConfig};
pub use error::{Result, TritonError};
