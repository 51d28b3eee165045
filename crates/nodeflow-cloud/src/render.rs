//! Folding reconciled resources into the cluster state
//!
//! Render records a resource's identifying fields in the snapshot the
//! orchestrator persists, so the next cycle can find the node again.
//! Serialization helpers produce the JSON form of that snapshot.

use crate::model::ProvisionedResource;
use crate::state::ClusterState;

/// New snapshot recording `resource`'s identifier under its name
///
/// A resource without identifier removes the entry.
pub fn fold(resource: &ProvisionedResource, state: &ClusterState) -> ClusterState {
    let mut rendered = state.clone();
    if resource.exists() {
        rendered
            .members
            .insert(resource.name.clone(), resource.identifier.clone());
    } else {
        rendered.members.remove(&resource.name);
    }
    tracing::debug!(
        resource = %resource.name,
        identifier = %resource.identifier,
        "Rendered resource into cluster state"
    );
    rendered
}

pub fn to_json(state: &ClusterState) -> serde_json::Result<String> {
    serde_json::to_string_pretty(state)
}

pub fn from_json(content: &str) -> serde_json::Result<ClusterState> {
    serde_json::from_str(content)
}
