//! Cluster state snapshot
//!
//! The orchestrator owns [`ClusterState`] and persists it between cycles.
//! Reconcile operations never mutate the snapshot they receive: changes are
//! collected in a [`StatePatch`] and merged into a new snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Injection key for the control-plane `address:port`
pub const INJECTED_MASTER: &str = "INJECTEDMASTER";

/// Injection key for the control-plane port
pub const INJECTED_PORT: &str = "INJECTEDPORT";

/// Shared cluster configuration consumed and updated by reconcile cycles
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterState {
    /// Cluster name
    pub name: String,

    /// Control-plane endpoint address
    #[serde(default)]
    pub endpoint: String,

    /// Control-plane listening port
    pub port: String,

    /// Values injected into bootstrap templates
    #[serde(default)]
    pub values: BTreeMap<String, String>,

    /// Remote identifiers of reconciled members, by resource name
    #[serde(default)]
    pub members: BTreeMap<String, String>,
}

impl ClusterState {
    pub fn new(name: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: port.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn member_identifier(&self, name: &str) -> Option<&str> {
        self.members.get(name).map(String::as_str)
    }

    /// New snapshot with the patch applied
    pub fn merge(&self, patch: &StatePatch) -> ClusterState {
        let mut merged = self.clone();
        if let Some(endpoint) = &patch.endpoint {
            merged.endpoint = endpoint.clone();
        }
        merged
            .values
            .extend(patch.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

/// Changes produced by an Apply, merged by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatePatch {
    pub endpoint: Option<String>,
    pub values: BTreeMap<String, String>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = Some(endpoint.into());
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.endpoint.is_none() && self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_leaves_original_untouched() {
        let state = ClusterState::new("demo", "443").with_value("EXISTING", "1");

        let mut patch = StatePatch::new();
        patch.set_endpoint("10.0.0.5");
        patch.set_value(INJECTED_PORT, "443");

        let merged = state.merge(&patch);

        assert_eq!(merged.endpoint, "10.0.0.5");
        assert_eq!(merged.value(INJECTED_PORT), Some("443"));
        assert_eq!(merged.value("EXISTING"), Some("1"));
        assert!(state.endpoint.is_empty());
        assert!(state.value(INJECTED_PORT).is_none());
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let state = ClusterState::new("demo", "6443").with_endpoint("10.0.0.1");
        let patch = StatePatch::new();

        assert!(patch.is_empty());
        assert_eq!(state.merge(&patch), state);
    }

    #[test]
    fn test_patch_overrides_existing_value() {
        let state = ClusterState::new("demo", "6443").with_value(INJECTED_MASTER, "old:6443");

        let mut patch = StatePatch::new();
        patch.set_value(INJECTED_MASTER, "10.0.0.9:6443");

        assert_eq!(
            state.merge(&patch).value(INJECTED_MASTER),
            Some("10.0.0.9:6443")
        );
    }
}
