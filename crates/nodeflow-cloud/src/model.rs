//! Node resource model
//!
//! [`NodeSpec`] is the configuration handed in by the orchestrator.
//! [`ProvisionedResource`] is the immutable value produced by every
//! reconcile stage and compared between Actual and Expected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag key carrying the node's human name
pub const NAME_TAG: &str = "Name";

/// Role of a node within the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberRole {
    /// Control-plane member; its address is discovered after creation
    ControlPlane,
    /// Worker joining the control-plane member identified by `control_plane_id`
    Worker { control_plane_id: String },
}

impl MemberRole {
    pub fn is_control_plane(&self) -> bool {
        matches!(self, MemberRole::ControlPlane)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::ControlPlane => write!(f, "control-plane"),
            MemberRole::Worker { .. } => write!(f, "worker"),
        }
    }
}

/// Desired configuration of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,

    /// Remote id from a previous cycle, empty when never created
    #[serde(default)]
    pub identifier: String,

    pub role: MemberRole,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    /// Ordered bootstrap script references
    #[serde(default)]
    pub bootstrap_scripts: Vec<String>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, role: MemberRole) -> Self {
        let name = name.into();
        let tags = BTreeMap::from([(NAME_TAG.to_string(), name.clone())]);
        Self {
            name,
            identifier: String::new(),
            role,
            tags,
            bootstrap_scripts: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_bootstrap_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bootstrap_scripts = scripts.into_iter().map(Into::into).collect();
        self
    }
}

/// A node as seen by one reconcile stage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProvisionedResource {
    pub name: String,

    /// Remote id; empty means the node does not exist remotely
    pub identifier: String,

    pub tags: BTreeMap<String, String>,

    /// `None` when the node was observed as absent
    pub role: Option<MemberRole>,

    pub bootstrap_scripts: Vec<String>,
}

impl ProvisionedResource {
    /// Resource with only name and tags populated
    pub fn absent(name: impl Into<String>, tags: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            tags,
            ..Default::default()
        }
    }

    /// Desired resource for a spec
    pub fn from_spec(spec: &NodeSpec) -> Self {
        Self {
            name: spec.name.clone(),
            identifier: spec.identifier.clone(),
            tags: spec.tags.clone(),
            role: Some(spec.role.clone()),
            bootstrap_scripts: spec.bootstrap_scripts.clone(),
        }
    }

    pub fn exists(&self) -> bool {
        !self.identifier.is_empty()
    }

    /// Configuration to feed into the next cycle, if the role is known
    pub fn to_spec(&self) -> Option<NodeSpec> {
        let role = self.role.clone()?;
        Some(NodeSpec {
            name: self.name.clone(),
            identifier: self.identifier.clone(),
            role,
            tags: self.tags.clone(),
            bootstrap_scripts: self.bootstrap_scripts.clone(),
        })
    }
}
