//! CNI selection and the cluster overrides it implies.
//!
//! Talos ships flannel by default. Any other CNI (Cilium in practice) needs
//! the built-in CNI disabled, and depending on its Helm values also needs
//! kube-proxy disabled, host DNS forwarding turned off and the Gateway API
//! CRDs installed as extra manifests.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use crate::cluster::KubePrism;
use crate::merge::{at, deep_merge, empty, lookup, mapping};

/// CNI Talos installs when nothing else is selected.
pub const DEFAULT_CNI: &str = "flannel";

/// Gateway API release used for the CRD manifests.
pub const DEFAULT_GATEWAY_API_VERSION: &str = "v1.2.1";

/// CNI configuration for a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CniSpec {
    /// CNI name (`flannel`, `cilium`, ...).
    #[serde(default = "default_cni")]
    pub name: String,
    /// Helm values for the CNI chart.
    #[serde(default)]
    pub values: Value,
    /// Gateway API release for the CRD manifests.
    #[serde(default = "default_gateway_api_version")]
    pub gateway_api_version: String,
}

fn default_cni() -> String {
    DEFAULT_CNI.to_string()
}

fn default_gateway_api_version() -> String {
    DEFAULT_GATEWAY_API_VERSION.to_string()
}

impl Default for CniSpec {
    fn default() -> Self {
        Self {
            name: default_cni(),
            values: Value::Null,
            gateway_api_version: default_gateway_api_version(),
        }
    }
}

impl CniSpec {
    /// Create a CNI spec with the given Helm values.
    #[must_use]
    pub fn new(name: impl Into<String>, values: Value) -> Self {
        Self {
            name: name.into(),
            values,
            ..Default::default()
        }
    }

    /// Whether this is the Talos built-in CNI.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.name.eq_ignore_ascii_case(DEFAULT_CNI)
    }

    /// Values say the CNI replaces kube-proxy.
    #[must_use]
    pub fn replaces_kube_proxy(&self) -> bool {
        truthy(lookup(&self.values, &["kubeProxyReplacement"]))
    }

    /// Values enable BPF masquerading.
    #[must_use]
    pub fn bpf_masquerade(&self) -> bool {
        truthy(lookup(&self.values, &["bpf", "masquerade"]))
    }

    /// Values enable Gateway API support.
    #[must_use]
    pub fn gateway_api(&self) -> bool {
        truthy(lookup(&self.values, &["gatewayAPI", "enabled"]))
    }

    /// Gateway API CRD manifest URLs for the configured release.
    #[must_use]
    pub fn gateway_api_manifests(&self) -> Vec<String> {
        let version = &self.gateway_api_version;
        vec![
            format!(
                "https://github.com/kubernetes-sigs/gateway-api/releases/download/{version}/standard-install.yaml"
            ),
            format!(
                "https://raw.githubusercontent.com/kubernetes-sigs/gateway-api/{version}/config/crd/experimental/gateway.networking.k8s.io_tlsroutes.yaml"
            ),
        ]
    }
}

/// Helm values accept `true`, `"true"` and (older Cilium) `"strict"`.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(enabled)) => *enabled,
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "true" | "strict"),
        _ => false,
    }
}

/// Cluster override for a non-default CNI; `None` for flannel.
#[must_use]
pub fn override_patch(cni: &CniSpec) -> Option<Value> {
    if cni.is_default() {
        return None;
    }

    let mut layers = vec![at(&["cluster", "network", "cni", "name"], Value::from("none"))];

    if cni.replaces_kube_proxy() {
        layers.push(at(&["cluster", "proxy", "disabled"], Value::Bool(true)));
    }
    if cni.bpf_masquerade() {
        layers.push(at(
            &["machine", "features", "hostDNS", "forwardKubeDNSToHost"],
            Value::Bool(false),
        ));
    }
    if cni.gateway_api() {
        layers.push(at(
            &["cluster", "extraManifests"],
            Value::from(cni.gateway_api_manifests()),
        ));
    }

    debug!(
        cni = %cni.name,
        kube_proxy_replacement = cni.replaces_kube_proxy(),
        bpf_masquerade = cni.bpf_masquerade(),
        gateway_api = cni.gateway_api(),
        "Built CNI override"
    );
    Some(deep_merge(&empty(), &layers))
}

/// Helm values document for a non-default CNI.
///
/// When `KubePrism` is enabled the agent reaches the API server through the
/// local balancer unless the caller says otherwise.
#[must_use]
pub fn values_document(cni: &CniSpec, kube_prism: &KubePrism) -> Option<Value> {
    if cni.is_default() {
        return None;
    }

    let mut defaults = Vec::new();
    if kube_prism.enabled {
        defaults.push(mapping([
            ("k8sServiceHost", Value::from("localhost")),
            ("k8sServicePort", Value::from(kube_prism.port)),
        ]));
    }

    let values = match &cni.values {
        Value::Null => empty(),
        other => other.clone(),
    };
    defaults.push(values);
    Some(deep_merge(&empty(), &defaults))
}
