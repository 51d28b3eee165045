//! Compute node reconciler
//!
//! [`NodeReconciler`] drives one node (control-plane or worker member)
//! through the [`Resource`] cycle against a [`ComputeApi`].
//!
//! Apply ordering: image and network lookups precede the create call, and
//! the create call precedes any post-create address polling.

use crate::api::{
    ComputeApi, CreateInstanceInput, DeleteInstanceInput, GetInstanceInput, ListImagesInput,
    with_timeout,
};
use crate::bootstrap::BootstrapRenderer;
use crate::compare;
use crate::config::{PrerequisitePolicy, ProvisionConfig};
use crate::error::{ApiError, PrerequisiteKind, ReconcileError, Result};
use crate::model::{MemberRole, NodeSpec, ProvisionedResource};
use crate::poller::AddressPoller;
use crate::render;
use crate::resource::{Reconciled, Resource};
use crate::state::{ClusterState, INJECTED_MASTER, INJECTED_PORT, StatePatch};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Metadata key carrying the rendered bootstrap script
pub const USER_SCRIPT_KEY: &str = "user-script";

/// Reconciler for one compute node
pub struct NodeReconciler {
    spec: NodeSpec,
    api: Arc<dyn ComputeApi>,
    renderer: Arc<dyn BootstrapRenderer>,
    poller: AddressPoller,
    config: ProvisionConfig,
}

impl NodeReconciler {
    pub fn new(
        spec: NodeSpec,
        api: Arc<dyn ComputeApi>,
        renderer: Arc<dyn BootstrapRenderer>,
        config: ProvisionConfig,
    ) -> Self {
        let poller = AddressPoller::from_config(api.clone(), &config);
        Self {
            spec,
            api,
            renderer,
            poller,
            config,
        }
    }

    /// Abort address polling once the channel reports `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.poller = self.poller.with_shutdown(shutdown);
        self
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    /// Remove the node remotely, then clear its bookkeeping
    #[instrument(skip_all, fields(resource = %self.spec.name))]
    pub async fn destroy(
        &self,
        actual: &ProvisionedResource,
        state: &ClusterState,
    ) -> Result<Reconciled> {
        self.require_identifier(actual)?;

        info!(id = %actual.identifier, "Deleting instance");
        self.call(
            "delete_instance",
            self.api
                .delete_instance(&DeleteInstanceInput::new(&actual.identifier)),
        )
        .await?;

        self.delete(actual, state).await
    }

    fn require_identifier(&self, actual: &ProvisionedResource) -> Result<()> {
        if actual.identifier.is_empty() {
            return Err(ReconcileError::MissingIdentifier {
                resource: actual.name.clone(),
            });
        }
        Ok(())
    }

    /// Remote call under the configured deadline, errors tagged with the resource
    async fn call<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ApiError>>,
    {
        with_timeout(self.config.request_timeout(), call)
            .await
            .map_err(|source| ReconcileError::Transport {
                resource: self.spec.name.clone(),
                operation,
                source,
            })
    }

    /// Empty reference under the degrade policy, NotFound otherwise
    fn missing(&self, kind: PrerequisiteKind, name: &str) -> Result<String> {
        match self.config.prerequisite_policy {
            PrerequisitePolicy::FailFast => Err(ReconcileError::NotFound {
                resource: self.spec.name.clone(),
                kind,
                name: name.to_string(),
            }),
            PrerequisitePolicy::Degrade => {
                warn!(
                    resource = %self.spec.name,
                    %kind,
                    name,
                    "No match found, continuing with an empty reference"
                );
                Ok(String::new())
            }
        }
    }

    async fn resolve_image(&self) -> Result<String> {
        let input = ListImagesInput {
            name: self.config.image_name.clone(),
            version: self.config.image_version.clone(),
        };
        let images = self.call("list_images", self.api.list_images(&input)).await?;

        match images.into_iter().next() {
            Some(image) => {
                debug!(image = %image.id, "Resolved image");
                Ok(image.id)
            }
            None => self.missing(
                PrerequisiteKind::Image,
                &format!("{}@{}", input.name, input.version),
            ),
        }
    }

    /// Public then fabric network ids, matched by exact name
    async fn resolve_networks(&self) -> Result<Vec<String>> {
        let networks = self.call("list_networks", self.api.list_networks()).await?;

        let mut ids = Vec::with_capacity(2);
        for wanted in [&self.config.public_network, &self.config.fabric_network] {
            let id = match networks.iter().find(|n| &n.name == wanted) {
                Some(network) => network.id.clone(),
                None => self.missing(PrerequisiteKind::Network, wanted)?,
            };
            ids.push(id);
        }
        debug!(networks = ?ids, "Resolved networks");
        Ok(ids)
    }
}

#[async_trait]
impl Resource for NodeReconciler {
    fn name(&self) -> &str {
        &self.spec.name
    }

    #[instrument(skip_all, fields(resource = %self.spec.name))]
    async fn actual(&self, state: &ClusterState) -> Result<Reconciled> {
        debug!(identifier = %self.spec.identifier, "Reading actual state");

        if self.spec.identifier.is_empty() {
            let absent = ProvisionedResource::absent(&self.spec.name, self.spec.tags.clone());
            return Ok(Reconciled::unchanged(state, absent));
        }

        let instance = self
            .call(
                "get_instance",
                self.api
                    .get_instance(&GetInstanceInput::new(&self.spec.identifier)),
            )
            .await?;

        // Role and scripts live only in configuration
        let resource = ProvisionedResource {
            name: instance.name,
            identifier: instance.id,
            tags: instance.tags,
            role: Some(self.spec.role.clone()),
            bootstrap_scripts: self.spec.bootstrap_scripts.clone(),
        };
        Ok(Reconciled::unchanged(state, resource))
    }

    #[instrument(skip_all, fields(resource = %self.spec.name))]
    async fn expected(&self, state: &ClusterState) -> Result<Reconciled> {
        debug!("Computing expected state");
        Ok(Reconciled::unchanged(
            state,
            ProvisionedResource::from_spec(&self.spec),
        ))
    }

    #[instrument(skip_all, fields(resource = %self.spec.name, role = %self.spec.role))]
    async fn apply(
        &self,
        actual: &ProvisionedResource,
        expected: &ProvisionedResource,
        state: &ClusterState,
    ) -> Result<Reconciled> {
        if compare::is_equal(actual, expected) {
            debug!("Already converged, nothing to apply");
            return Ok(Reconciled::unchanged(state, expected.clone()));
        }

        let name = &self.spec.name;

        // Apply only creates; an existing instance is never replaced
        if actual.exists() {
            let fields = compare::differences(actual, expected);
            warn!(id = %actual.identifier, ?fields, "Instance differs from configuration");
            return Err(ReconcileError::Drift {
                resource: name.clone(),
                id: actual.identifier.clone(),
                fields,
            });
        }

        let mut patch = StatePatch::new();

        // Workers join an existing control-plane member
        if let MemberRole::Worker { control_plane_id } = &self.spec.role {
            if control_plane_id.is_empty() {
                return Err(ReconcileError::MissingIdentifier {
                    resource: name.clone(),
                });
            }
            let address = self
                .poller
                .discover(control_plane_id)
                .await
                .into_address(name, control_plane_id)?;
            info!(control_plane = %control_plane_id, %address, "Discovered control-plane address");
            patch.set_value(INJECTED_MASTER, format!("{}:{}", address, state.port));
            patch.set_endpoint(address);
        }
        patch.set_value(INJECTED_PORT, state.port.clone());

        let staged = state.merge(&patch);
        let script = self
            .renderer
            .render(&expected.bootstrap_scripts, &staged)
            .map_err(|source| ReconcileError::Bootstrap {
                resource: name.clone(),
                source,
            })?;

        let image = self.resolve_image().await?;
        let networks = self.resolve_networks().await?;

        let input = CreateInstanceInput {
            name: name.clone(),
            package: self.config.package.clone(),
            image,
            networks,
            metadata: BTreeMap::from([(USER_SCRIPT_KEY.to_string(), script)]),
            tags: expected.tags.clone(),
            services: vec![name.clone()],
        };
        info!(package = %input.package, image = %input.image, "Creating instance");
        let created = self
            .call("create_instance", self.api.create_instance(&input))
            .await?;
        info!(id = %created.id, "Instance created");

        // The control plane's address is only known once it has booted
        if self.spec.role.is_control_plane() {
            let address = self
                .poller
                .discover(&created.id)
                .await
                .into_address(name, &created.id)?;
            info!(%address, "Discovered control-plane address");
            patch.set_endpoint(address);
        }

        let resource = ProvisionedResource {
            name: name.clone(),
            identifier: created.id,
            tags: expected.tags.clone(),
            role: expected.role.clone(),
            bootstrap_scripts: expected.bootstrap_scripts.clone(),
        };
        let state = render::fold(&resource, &state.merge(&patch));

        Ok(Reconciled {
            state,
            resource,
            patch,
        })
    }

    /// Bookkeeping only; remote removal is [`NodeReconciler::destroy`]
    #[instrument(skip_all, fields(resource = %self.spec.name))]
    async fn delete(
        &self,
        actual: &ProvisionedResource,
        state: &ClusterState,
    ) -> Result<Reconciled> {
        self.require_identifier(actual)?;

        let cleared = ProvisionedResource::absent(&self.spec.name, self.spec.tags.clone());
        let state = render::fold(&cleared, state);
        debug!(identifier = %actual.identifier, "Cleared resource bookkeeping");

        Ok(Reconciled {
            state,
            resource: cleared,
            patch: StatePatch::default(),
        })
    }
}
