//! Actual/Expected comparison

use crate::model::ProvisionedResource;

/// Verdict of comparing Actual against Expected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Nothing to do this cycle
    Converged,
    /// Apply must run
    Diverged,
}

impl Convergence {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged)
    }
}

impl std::fmt::Display for Convergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Convergence::Converged => write!(f, "converged"),
            Convergence::Diverged => write!(f, "diverged"),
        }
    }
}

/// Full structural equality, tag maps included
pub fn is_equal(actual: &ProvisionedResource, expected: &ProvisionedResource) -> bool {
    actual == expected
}

pub fn compare(actual: &ProvisionedResource, expected: &ProvisionedResource) -> Convergence {
    if is_equal(actual, expected) {
        Convergence::Converged
    } else {
        Convergence::Diverged
    }
}

/// Names of the fields that differ, for logging
pub fn differences(
    actual: &ProvisionedResource,
    expected: &ProvisionedResource,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if actual.name != expected.name {
        fields.push("name");
    }
    if actual.identifier != expected.identifier {
        fields.push("identifier");
    }
    if actual.tags != expected.tags {
        fields.push("tags");
    }
    if actual.role != expected.role {
        fields.push("role");
    }
    if actual.bootstrap_scripts != expected.bootstrap_scripts {
        fields.push("bootstrap_scripts");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemberRole, NodeSpec};
    use std::collections::BTreeMap;

    #[test]
    fn test_uncreated_resource_never_converged() {
        let spec = NodeSpec::new(
            "node-1",
            MemberRole::Worker {
                control_plane_id: "i-master".to_string(),
            },
        );
        let actual = ProvisionedResource::absent("node-1", spec.tags.clone());
        let expected = ProvisionedResource::from_spec(&spec);

        assert_eq!(compare(&actual, &expected), Convergence::Diverged);
        assert_eq!(differences(&actual, &expected), vec!["role"]);
    }

    #[test]
    fn test_identical_resources_converged() {
        let spec = NodeSpec::new("master-0", MemberRole::ControlPlane).with_identifier("i-1");
        let a = ProvisionedResource::from_spec(&spec);
        let b = ProvisionedResource::from_spec(&spec);

        assert!(compare(&a, &b).is_converged());
        assert!(differences(&a, &b).is_empty());
    }

    #[test]
    fn test_nested_tag_difference_detected() {
        let spec = NodeSpec::new("master-0", MemberRole::ControlPlane).with_identifier("i-1");
        let expected = ProvisionedResource::from_spec(&spec);
        let mut actual = expected.clone();
        actual.tags = BTreeMap::from([("Name".to_string(), "master-old".to_string())]);

        assert!(!is_equal(&actual, &expected));
        assert_eq!(differences(&actual, &expected), vec!["tags"]);
    }
}
