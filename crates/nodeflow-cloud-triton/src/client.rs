//! Triton CloudAPI client
//!
//! Implements [`ComputeApi`] over the CloudAPI REST endpoints. Every request
//! is signed via the configured [`RequestSigner`].

use crate::auth::{PrivateKeySigner, RequestSigner, authorization_header};
use crate::config::TritonConfig;
use crate::error::{Result, TritonError};
use async_trait::async_trait;
use nodeflow_cloud::{
    ApiError, ComputeApi, CreateInstanceInput, DeleteInstanceInput, GetInstanceInput, Image,
    Instance, ListImagesInput, ListInstancesInput, Network,
};
use reqwest::{Method, RequestBuilder, Response, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

const API_VERSION: &str = "~9";
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Tag prefix reserved by Triton
const RESERVED_TAG_PREFIX: &str = "triton.";
/// Tag holding the CNS service names
const CNS_SERVICES_TAG: &str = "triton.cns.services";

/// CloudAPI client for one account
pub struct TritonClient {
    http: reqwest::Client,
    base_url: Url,
    account: String,
    key_path: String,
    signer: Arc<dyn RequestSigner>,
}

impl TritonClient {
    pub fn new(config: &TritonConfig, signer: Arc<dyn RequestSigner>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("nodeflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TritonError::ClientSetup(e.to_string()))?;
        let base_url = Url::parse(config.url.trim_end_matches('/'))
            .map_err(|e| TritonError::ClientSetup(format!("{}: {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TritonError::ClientSetup(format!(
                "{} cannot be used as a base URL",
                config.url
            )));
        }

        Ok(Self {
            http,
            base_url,
            account: config.account.clone(),
            key_path: config.key_path(),
            signer,
        })
    }

    /// Create a client from `TRITON_*` environment variables
    ///
    /// `TRITON_KEY_MATERIAL` must name a key file or hold the key itself;
    /// agent-backed signers go through [`TritonClient::new`].
    pub fn from_env() -> Result<Self> {
        let config = TritonConfig::from_env()?;
        let signer = PrivateKeySigner::from_key_source(&config.key_source()?)?;
        Self::new(&config, Arc::new(signer))
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// `/{account}/{segments..}`, each segment percent-encoded
    fn url(&self, segments: &[&str]) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Request(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(&self.account)
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> std::result::Result<RequestBuilder, ApiError> {
        let url = self.url(segments)?;
        let date = chrono::Utc::now().format(DATE_FORMAT).to_string();
        let authorization = authorization_header(&self.key_path, self.signer.as_ref(), &date)?;

        Ok(self
            .http
            .request(method, url)
            .header(header::DATE, date)
            .header(header::AUTHORIZATION, authorization)
            .header(header::ACCEPT, "application/json")
            .header("accept-version", API_VERSION))
    }

    async fn send(&self, builder: RequestBuilder) -> std::result::Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) => (error.code, error.message),
            Err(_) => (
                status.canonical_reason().unwrap_or("Unknown").to_string(),
                body,
            ),
        };

        Err(ApiError::Status {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> std::result::Result<T, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ComputeApi for TritonClient {
    #[instrument(skip(self, input), fields(id = %input.id))]
    async fn get_instance(
        &self,
        input: &GetInstanceInput,
    ) -> std::result::Result<Instance, ApiError> {
        let builder = self.request(Method::GET, &["machines", input.id.as_str()])?;
        let machine: Machine = self.get_json(builder).await?;
        Ok(machine.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_instance(
        &self,
        input: &CreateInstanceInput,
    ) -> std::result::Result<Instance, ApiError> {
        debug!(
            package = %input.package,
            image = %input.image,
            networks = input.networks.len(),
            "Creating machine"
        );

        let builder = self
            .request(Method::POST, &["machines"])?
            .json(&create_body(input));
        let machine: Machine = self.get_json(builder).await?;
        Ok(machine.into())
    }

    async fn list_instances(
        &self,
        input: &ListInstancesInput,
    ) -> std::result::Result<Vec<Instance>, ApiError> {
        let mut builder = self.request(Method::GET, &["machines"])?;
        if let Some(name) = &input.name {
            builder = builder.query(&[("name", name)]);
        }

        let machines: Vec<Machine> = self.get_json(builder).await?;
        Ok(machines.into_iter().map(Instance::from).collect())
    }

    #[instrument(skip(self, input), fields(id = %input.id))]
    async fn delete_instance(
        &self,
        input: &DeleteInstanceInput,
    ) -> std::result::Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &["machines", input.id.as_str()])?;
        self.send(builder).await?;
        debug!("Machine deletion accepted");
        Ok(())
    }

    async fn list_images(
        &self,
        input: &ListImagesInput,
    ) -> std::result::Result<Vec<Image>, ApiError> {
        let builder = self
            .request(Method::GET, &["images"])?
            .query(&[("name", &input.name), ("version", &input.version)]);
        self.get_json(builder).await
    }

    async fn list_networks(&self) -> std::result::Result<Vec<Network>, ApiError> {
        let builder = self.request(Method::GET, &["networks"])?;
        self.get_json(builder).await
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// Machine as returned by CloudAPI
#[derive(Debug, Deserialize)]
struct Machine {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    ips: Vec<String>,
    #[serde(default)]
    tags: Map<String, Value>,
    #[serde(default)]
    state: Option<String>,
}

impl From<Machine> for Instance {
    fn from(machine: Machine) -> Self {
        let mut tags = BTreeMap::new();
        let mut services = Vec::new();

        for (key, value) in machine.tags {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            if key == CNS_SERVICES_TAG {
                services = split_services(&value);
            } else if !key.starts_with(RESERVED_TAG_PREFIX) {
                tags.insert(key, value);
            }
        }

        Instance {
            id: machine.id,
            name: machine.name,
            ips: machine.ips,
            tags,
            services,
            state: machine.state,
        }
    }
}

fn split_services(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Flattened create body (`metadata.<key>`, `tag.<key>`)
fn create_body(input: &CreateInstanceInput) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("name".to_string(), Value::from(input.name.as_str()));
    body.insert("package".to_string(), Value::from(input.package.as_str()));
    body.insert("image".to_string(), Value::from(input.image.as_str()));
    if !input.networks.is_empty() {
        body.insert("networks".to_string(), Value::from(input.networks.clone()));
    }

    for (key, value) in &input.metadata {
        body.insert(format!("metadata.{}", key), Value::from(value.as_str()));
    }
    for (key, value) in &input.tags {
        body.insert(format!("tag.{}", key), Value::from(value.as_str()));
    }
    if !input.services.is_empty() {
        body.insert(
            format!("tag.{}", CNS_SERVICES_TAG),
            Value::from(input.services.join(",")),
        );
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_machine_strips_reserved_tags() {
        let machine: Machine = serde_json::from_value(json!({
            "id": "i-1",
            "name": "master-0",
            "state": "running",
            "ips": ["165.225.1.10"],
            "tags": {
                "Name": "master-0",
                "triton.cns.services": "master-0, k8s",
                "triton.cns.disable": true,
                "replicas": 3
            }
        }))
        .unwrap();

        let instance = Instance::from(machine);

        assert_eq!(instance.services, vec!["master-0", "k8s"]);
        assert_eq!(instance.tags.len(), 2);
        assert_eq!(instance.tags["Name"], "master-0");
        assert_eq!(instance.tags["replicas"], "3");
    }

    #[test]
    fn test_create_body_flattens_metadata_and_tags() {
        let input = CreateInstanceInput {
            name: "node-1".to_string(),
            package: "k4-highcpu-kvm-1.75G".to_string(),
            image: "img-1".to_string(),
            networks: vec!["net-public".to_string(), "net-fabric".to_string()],
            metadata: BTreeMap::from([("user-script".to_string(), "#!/bin/bash".to_string())]),
            tags: BTreeMap::from([("Name".to_string(), "node-1".to_string())]),
            services: vec!["node-1".to_string()],
        };

        let body = create_body(&input);

        assert_eq!(body["metadata.user-script"], "#!/bin/bash");
        assert_eq!(body["tag.Name"], "node-1");
        assert_eq!(body["tag.triton.cns.services"], "node-1");
        assert_eq!(body["networks"], json!(["net-public", "net-fabric"]));
    }

    #[test]
    fn test_create_body_omits_empty_networks() {
        let input = CreateInstanceInput {
            name: "node-1".to_string(),
            ..Default::default()
        };

        let body = create_body(&input);

        assert!(!body.contains_key("networks"));
        assert!(!body.contains_key("tag.triton.cns.services"));
    }
}
