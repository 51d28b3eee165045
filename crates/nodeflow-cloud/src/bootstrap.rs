//! Bootstrap script rendering
//!
//! A node's bootstrap scripts are an ordered list of references. Each
//! reference is either a built-in script shipped with NodeFlow or a file
//! path relative to the renderer's base directory. Every script is expanded
//! with Tera against the cluster state and the results are concatenated in
//! order into the instance's `user-script`.

use crate::error::BootstrapError;
use crate::state::ClusterState;
use std::path::{Path, PathBuf};
use tera::Context;

/// Renders a node's bootstrap scripts into one script text
pub trait BootstrapRenderer: Send + Sync {
    fn render(&self, scripts: &[String], state: &ClusterState) -> Result<String, BootstrapError>;
}

/// Control-plane bootstrap (kubeadm init)
pub const CONTROL_PLANE_SETUP: &str = r#"#!/bin/bash
# nodeflow: control-plane bootstrap for cluster {{ cluster_name }}
set -e

PORT="{{ INJECTEDPORT }}"
PUBLIC_IP=$(ip -4 addr show net0 | grep -oP '(?<=inet\s)\d+(\.\d+){3}' | head -n1)

apt-get update
apt-get install -y kubelet kubeadm kubectl kubernetes-cni

kubeadm reset --force
kubeadm init --apiserver-bind-port "$PORT" --apiserver-advertise-address "$PUBLIC_IP"

mkdir -p /root/.kube
cp -f /etc/kubernetes/admin.conf /root/.kube/config
"#;

/// Worker bootstrap (kubeadm join)
pub const WORKER_SETUP: &str = r#"#!/bin/bash
# nodeflow: worker bootstrap for cluster {{ cluster_name }}
set -e

apt-get update
apt-get install -y kubelet kubeadm kubernetes-cni

kubeadm reset --force
kubeadm join {{ INJECTEDMASTER }} --discovery-token-unsafe-skip-ca-verification
"#;

/// Docker runtime setup shared by every role
pub const DOCKER_SETUP: &str = r#"#!/bin/bash
# nodeflow: container runtime setup
set -e

if ! command -v docker &> /dev/null; then
    curl -fsSL https://get.docker.com | sh
fi

systemctl enable docker
systemctl start docker
"#;

/// Script content for a built-in script name
pub fn get_builtin_script(name: &str) -> Option<&'static str> {
    match name {
        "triton_k8s_master.sh" => Some(CONTROL_PLANE_SETUP),
        "triton_k8s_node.sh" => Some(WORKER_SETUP),
        "docker_setup.sh" => Some(DOCKER_SETUP),
        _ => None,
    }
}

pub fn is_builtin_script(name: &str) -> bool {
    get_builtin_script(name).is_some()
}

/// Tera-backed renderer for built-in and on-disk scripts
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    base_dir: Option<PathBuf>,
}

impl TemplateRenderer {
    /// Renderer that only knows built-in scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Renderer that also resolves file references under `base_dir`
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: Some(base_dir.as_ref().to_path_buf()),
        }
    }

    fn load(&self, script: &str) -> Result<String, BootstrapError> {
        if let Some(content) = get_builtin_script(script) {
            return Ok(content.to_string());
        }

        let base_dir = self
            .base_dir
            .as_ref()
            .ok_or_else(|| BootstrapError::UnknownScript(script.to_string()))?;
        let path = base_dir.join(script);
        if !path.is_file() {
            return Err(BootstrapError::UnknownScript(script.to_string()));
        }

        std::fs::read_to_string(&path).map_err(|e| BootstrapError::Io {
            path,
            message: e.to_string(),
        })
    }
}

impl BootstrapRenderer for TemplateRenderer {
    fn render(&self, scripts: &[String], state: &ClusterState) -> Result<String, BootstrapError> {
        let context = build_context(state);
        let mut result = String::new();

        for script in scripts {
            let template = self.load(script)?;
            let rendered = tera::Tera::one_off(&template, &context, false).map_err(|e| {
                BootstrapError::Template {
                    script: script.clone(),
                    message: extract_tera_error_detail(&e),
                }
            })?;
            tracing::debug!(script = %script, bytes = rendered.len(), "Rendered bootstrap script");
            result.push_str(&rendered);
            if !rendered.ends_with('\n') {
                result.push('\n');
            }
        }

        Ok(result)
    }
}

/// Injection values plus `cluster_name`, `endpoint` and `port`
fn build_context(state: &ClusterState) -> Context {
    let mut context = Context::new();
    for (key, value) in &state.values {
        context.insert(key.as_str(), value);
    }
    context.insert("cluster_name", &state.name);
    context.insert("endpoint", &state.endpoint);
    context.insert("port", &state.port);
    context
}

/// Flatten a Tera error chain, pointing out undefined variables
fn extract_tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + 10..start + end];
        return format!("undefined variable `{}`", var_name);
    }

    full_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{INJECTED_MASTER, INJECTED_PORT};
    use std::fs;

    fn scripts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(is_builtin_script("triton_k8s_master.sh"));
        assert!(is_builtin_script("triton_k8s_node.sh"));
        assert!(!is_builtin_script("custom.sh"));
    }

    #[test]
    fn test_worker_script_gets_master_address() {
        let state = ClusterState::new("demo", "6443")
            .with_value(INJECTED_MASTER, "10.0.0.5:6443")
            .with_value(INJECTED_PORT, "6443");

        let rendered = TemplateRenderer::new()
            .render(&scripts(&["triton_k8s_node.sh"]), &state)
            .unwrap();

        assert!(rendered.contains("kubeadm join 10.0.0.5:6443"));
        assert!(rendered.contains("cluster demo"));
    }

    #[test]
    fn test_scripts_concatenated_in_order() {
        let state = ClusterState::new("demo", "443").with_value(INJECTED_PORT, "443");

        let rendered = TemplateRenderer::new()
            .render(&scripts(&["docker_setup.sh", "triton_k8s_master.sh"]), &state)
            .unwrap();

        let docker = rendered.find("container runtime setup").unwrap();
        let master = rendered.find("control-plane bootstrap").unwrap();
        assert!(docker < master);
        assert!(rendered.contains(r#"PORT="443""#));
    }

    #[test]
    fn test_missing_variable_names_it() {
        let state = ClusterState::new("demo", "6443");

        let err = TemplateRenderer::new()
            .render(&scripts(&["triton_k8s_node.sh"]), &state)
            .unwrap_err();

        match err {
            BootstrapError::Template { script, message } => {
                assert_eq!(script, "triton_k8s_node.sh");
                assert!(
                    message.contains("INJECTEDMASTER"),
                    "message should name the variable: {}",
                    message
                );
            }
            other => panic!("Expected Template error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_script_from_base_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(
            temp_dir.path().join("vpn.sh"),
            "echo {{ endpoint }}:{{ port }}\n",
        )
        .unwrap();

        let state = ClusterState::new("demo", "6443").with_endpoint("10.0.0.5");
        let rendered = TemplateRenderer::with_base_dir(temp_dir.path())
            .render(&scripts(&["vpn.sh"]), &state)
            .unwrap();

        assert_eq!(rendered, "echo 10.0.0.5:6443\n");
    }

    #[test]
    fn test_unknown_script() {
        let state = ClusterState::new("demo", "6443");

        let err = TemplateRenderer::new()
            .render(&scripts(&["nope.sh"]), &state)
            .unwrap_err();

        assert!(matches!(err, BootstrapError::UnknownScript(name) if name == "nope.sh"));
    }

    #[test]
    fn test_empty_script_list() {
        let state = ClusterState::new("demo", "6443");
        let rendered = TemplateRenderer::new().render(&[], &state).unwrap();
        assert!(rendered.is_empty());
    }
}
