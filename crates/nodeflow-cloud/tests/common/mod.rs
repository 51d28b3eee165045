use async_trait::async_trait;
use nodeflow_cloud::{
    ApiError, ComputeApi, CreateInstanceInput, DeleteInstanceInput, GetInstanceInput, Image,
    Instance, ListImagesInput, ListInstancesInput, Network,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

/// In-memory ComputeApi driven by scripted responses
#[derive(Default)]
pub struct ScriptedApi {
    /// Queued get_instance answers per id; the last one repeats
    gets: Mutex<HashMap<String, VecDeque<GetResponse>>>,
    images: Vec<Image>,
    networks: Vec<Network>,
    next_id: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<String>>,
    pub created: Mutex<Vec<CreateInstanceInput>>,
    pub deleted: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub enum GetResponse {
    Instance(Instance),
    Fail(u16),
}

#[allow(dead_code)]
impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image and both default networks present
    pub fn with_defaults() -> Self {
        Self::new()
            .with_image("img-1", "ubuntu-certified-16.04", "20180222")
            .with_network("net-public", "Joyent-SDC-Public")
            .with_network("net-fabric", "My-Fabric-Network")
    }

    pub fn with_image(mut self, id: &str, name: &str, version: &str) -> Self {
        self.images.push(Image {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        });
        self
    }

    pub fn with_network(mut self, id: &str, name: &str) -> Self {
        self.networks.push(Network {
            id: id.to_string(),
            name: name.to_string(),
            public: false,
        });
        self
    }

    /// Id assigned to the next created instance
    pub fn with_next_id(self, id: &str) -> Self {
        self.next_id.lock().unwrap().push_back(id.to_string());
        self
    }

    pub fn push_get(&self, id: &str, response: GetResponse) {
        self.gets
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(response);
    }

    /// Instance `id` reporting the given addresses
    pub fn push_instance(&self, id: &str, name: &str, ips: &[&str]) {
        self.push_get(id, GetResponse::Instance(instance(id, name, ips)));
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }
}

pub fn instance(id: &str, name: &str, ips: &[&str]) -> Instance {
    Instance {
        id: id.to_string(),
        name: name.to_string(),
        ips: ips.iter().map(|s| s.to_string()).collect(),
        tags: BTreeMap::from([("Name".to_string(), name.to_string())]),
        services: vec![name.to_string()],
        state: Some("running".to_string()),
    }
}

fn status_error(status: u16) -> ApiError {
    ApiError::Status {
        status,
        code: "InternalError".to_string(),
        message: "scripted failure".to_string(),
    }
}

#[async_trait]
impl ComputeApi for ScriptedApi {
    async fn get_instance(&self, input: &GetInstanceInput) -> Result<Instance, ApiError> {
        self.record("get_instance");
        let mut gets = self.gets.lock().unwrap();
        let queue = gets.get_mut(&input.id).ok_or_else(|| ApiError::Status {
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: format!("{} not found", input.id),
        })?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match response {
            Some(GetResponse::Instance(instance)) => Ok(instance),
            Some(GetResponse::Fail(status)) => Err(status_error(status)),
            None => Err(status_error(500)),
        }
    }

    async fn create_instance(&self, input: &CreateInstanceInput) -> Result<Instance, ApiError> {
        self.record("create_instance");
        self.created.lock().unwrap().push(input.clone());
        let id = self
            .next_id
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "i-generated".to_string());
        Ok(Instance {
            id,
            name: input.name.clone(),
            tags: input.tags.clone(),
            services: input.services.clone(),
            state: Some("provisioning".to_string()),
            ..Default::default()
        })
    }

    async fn list_instances(&self, _input: &ListInstancesInput) -> Result<Vec<Instance>, ApiError> {
        self.record("list_instances");
        Ok(Vec::new())
    }

    async fn delete_instance(&self, input: &DeleteInstanceInput) -> Result<(), ApiError> {
        self.record("delete_instance");
        self.deleted.lock().unwrap().push(input.id.clone());
        Ok(())
    }

    async fn list_images(&self, input: &ListImagesInput) -> Result<Vec<Image>, ApiError> {
        self.record("list_images");
        Ok(self
            .images
            .iter()
            .filter(|i| i.name == input.name && i.version == input.version)
            .cloned()
            .collect())
    }

    async fn list_networks(&self) -> Result<Vec<Network>, ApiError> {
        self.record("list_networks");
        Ok(self.networks.clone())
    }
}

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
