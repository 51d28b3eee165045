//! Reconcilable resource abstraction
//!
//! Every provisionable resource goes through the same cycle:
//!
//! ```text
//! Unknown ──actual──▶ Observed ──expected──▶ Desired ──compare──┬─▶ Converged
//!                        │                                      └─▶ Diverged ──apply──▶ Converged'
//!                        └──delete──▶ Removed
//! ```

use crate::compare::{self, Convergence};
use crate::error::Result;
use crate::model::ProvisionedResource;
use crate::state::{ClusterState, StatePatch};
use async_trait::async_trait;

/// Result of one reconcile stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Snapshot to hand to the next stage or persist
    pub state: ClusterState,

    pub resource: ProvisionedResource,

    /// Changes merged into `state` by this stage
    pub patch: StatePatch,
}

impl Reconciled {
    /// Stage output that left the state as it was
    pub fn unchanged(state: &ClusterState, resource: ProvisionedResource) -> Self {
        Self {
            state: state.clone(),
            resource,
            patch: StatePatch::default(),
        }
    }
}

/// Actual/Expected/Apply/Delete contract of a provisionable resource
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource name used in logs and errors
    fn name(&self) -> &str;

    /// Read remote truth; never mutates the remote side
    async fn actual(&self, state: &ClusterState) -> Result<Reconciled>;

    /// Desired resource computed from configuration only
    async fn expected(&self, state: &ClusterState) -> Result<Reconciled>;

    /// Converge the remote side from `actual` towards `expected`
    async fn apply(
        &self,
        actual: &ProvisionedResource,
        expected: &ProvisionedResource,
        state: &ClusterState,
    ) -> Result<Reconciled>;

    /// Clear the resource's bookkeeping
    async fn delete(&self, actual: &ProvisionedResource, state: &ClusterState)
    -> Result<Reconciled>;
}

/// Outcome of a full reconcile cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub convergence: Convergence,
    pub reconciled: Reconciled,
}

/// Run Actual, Expected and Compare, then Apply when diverged
#[tracing::instrument(skip_all, fields(resource = %resource.name()))]
pub async fn reconcile<R>(resource: &R, state: &ClusterState) -> Result<CycleOutcome>
where
    R: Resource + ?Sized,
{
    let actual = resource.actual(state).await?;
    let expected = resource.expected(&actual.state).await?;

    let convergence = compare::compare(&actual.resource, &expected.resource);
    if convergence.is_converged() {
        tracing::debug!("Resource already converged");
        return Ok(CycleOutcome {
            convergence,
            reconciled: expected,
        });
    }

    tracing::info!(
        differences = ?compare::differences(&actual.resource, &expected.resource),
        "Resource diverged, applying"
    );
    let reconciled = resource
        .apply(&actual.resource, &expected.resource, &expected.state)
        .await?;

    Ok(CycleOutcome {
        convergence,
        reconciled,
    })
}
