//! Extension service documents (Tailscale).

use serde::{Deserialize, Serialize};

use crate::cluster::MeshSpec;
use crate::node::{NodeDescriptor, BASELINE_EXTENSION};

/// Extension that runs the mesh agent.
pub const TAILSCALE_EXTENSION: &str = BASELINE_EXTENSION;

/// Talos `ExtensionServiceConfig` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionServiceConfig {
    /// Always `v1alpha1`.
    pub api_version: String,
    /// Always `ExtensionServiceConfig`.
    pub kind: String,
    /// Extension service name.
    pub name: String,
    /// `KEY=value` environment entries.
    pub environment: Vec<String>,
}

impl ExtensionServiceConfig {
    /// Create an empty config for the named service.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: "v1alpha1".to_string(),
            kind: "ExtensionServiceConfig".to_string(),
            name: name.into(),
            environment: Vec::new(),
        }
    }

    /// Append an environment entry.
    #[must_use]
    pub fn with_env(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.environment.push(format!("{key}={}", value.as_ref()));
        self
    }
}

/// Tailscale service config for a node; `None` if it lacks the extension.
#[must_use]
pub fn tailscale_service(
    key: &str,
    node: &NodeDescriptor,
    mesh: &MeshSpec,
) -> Option<ExtensionServiceConfig> {
    if !node.has_extension(TAILSCALE_EXTENSION) {
        return None;
    }

    let mut config = ExtensionServiceConfig::new("tailscale");
    if let Some(auth_key) = mesh.auth_key.as_deref() {
        config = config.with_env("TS_AUTHKEY", auth_key);
    }
    config = config.with_env("TS_HOSTNAME", node.hostname_or(key));
    if !mesh.routes.is_empty() {
        config = config.with_env("TS_ROUTES", mesh.routes.join(","));
    }
    if !mesh.extra_args.is_empty() {
        config = config.with_env("TS_EXTRA_ARGS", mesh.extra_args.join(" "));
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tailscale_service_environment() {
        let mesh = MeshSpec {
            domain: None,
            auth_key: Some("tskey-auth-123".to_string()),
            routes: vec!["10.0.0.0/24".to_string(), "10.0.1.0/24".to_string()],
            extra_args: vec!["--accept-dns=false".to_string(), "--ssh".to_string()],
        };
        let node = NodeDescriptor::new("10.0.0.10", "/dev/sda");

        let config = tailscale_service("cp-1", &node, &mesh).unwrap();

        assert_eq!(config.name, "tailscale");
        assert_eq!(
            config.environment,
            vec![
                "TS_AUTHKEY=tskey-auth-123",
                "TS_HOSTNAME=cp-1",
                "TS_ROUTES=10.0.0.0/24,10.0.1.0/24",
                "TS_EXTRA_ARGS=--accept-dns=false --ssh",
            ]
        );
    }

    #[test]
    fn test_no_service_without_extension() {
        let node = NodeDescriptor::new("10.0.0.10", "/dev/sda").with_extensions(["siderolabs/zfs"]);
        assert!(tailscale_service("cp-1", &node, &MeshSpec::default()).is_none());
    }

    #[test]
    fn test_document_shape() {
        let yaml = serde_yaml::to_string(&ExtensionServiceConfig::new("tailscale")).unwrap();
        assert!(yaml.starts_with("apiVersion: v1alpha1\nkind: ExtensionServiceConfig\nname: tailscale\n"));
    }
}
