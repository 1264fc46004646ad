//! Cluster descriptor and the shared per-role base documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::cni::{self, CniSpec};
use crate::installer::{DEFAULT_REGISTRY, DEFAULT_TALOS_VERSION};
use crate::merge::{at, deep_merge, empty, mapping};
use crate::node::{NodeDescriptor, NodeRef, Role};

/// Default `KubePrism` port.
pub const KUBE_PRISM_PORT: u16 = 7445;

/// Node label that records whether `KubePrism` is on.
pub const KUBE_PRISM_LABEL: &str = "kubeprism.talos.dev/enabled";

/// Tailscale `MagicDNS` resolver followed by a public fallback.
pub const MESH_NAMESERVERS: [&str; 2] = ["100.100.100.100", "1.1.1.1"];

/// Kernel module the mesh needs for its tunnel device.
pub const MESH_KERNEL_MODULE: &str = "tun";

/// Default pod CIDR.
pub const DEFAULT_POD_SUBNET: &str = "10.244.0.0/16";

/// Default service CIDR.
pub const DEFAULT_SERVICE_SUBNET: &str = "10.96.0.0/12";

/// Pod and service address ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNetwork {
    /// Pod CIDRs.
    #[serde(default = "default_pod_subnets")]
    pub pod_subnets: Vec<String>,
    /// Service CIDRs.
    #[serde(default = "default_service_subnets")]
    pub service_subnets: Vec<String>,
}

fn default_pod_subnets() -> Vec<String> {
    vec![DEFAULT_POD_SUBNET.to_string()]
}

fn default_service_subnets() -> Vec<String> {
    vec![DEFAULT_SERVICE_SUBNET.to_string()]
}

impl Default for ClusterNetwork {
    fn default() -> Self {
        Self {
            pod_subnets: default_pod_subnets(),
            service_subnets: default_service_subnets(),
        }
    }
}

/// Tailscale mesh settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSpec {
    /// Tailnet domain suffix (e.g. `tail1234.ts.net`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Auth key for the Tailscale extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<String>,
    /// Subnet routes to advertise.
    #[serde(default)]
    pub routes: Vec<String>,
    /// Extra `tailscale up` arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// `KubePrism` local API load balancer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubePrism {
    /// Run the balancer on every node.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local port.
    #[serde(default = "default_kube_prism_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_kube_prism_port() -> u16 {
    KUBE_PRISM_PORT
}

impl Default for KubePrism {
    fn default() -> Self {
        Self {
            enabled: true,
            port: KUBE_PRISM_PORT,
        }
    }
}

/// Client certificate material for the generated talosconfig.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    /// Base64 CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    /// Base64 client certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crt: Option<String>,
    /// Base64 client key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Talos cluster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
    /// Kubernetes endpoint (e.g., `https://k8s.example.com:6443`).
    pub endpoint: String,
    /// Talos version to install.
    #[serde(default = "default_talos_version")]
    pub talos_version: String,
    /// Installer registry root.
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Pod and service networks.
    #[serde(default)]
    pub network: ClusterNetwork,
    /// CNI selection.
    #[serde(default)]
    pub cni: CniSpec,
    /// Mesh network settings.
    #[serde(default)]
    pub mesh: MeshSpec,
    /// Local API load balancer.
    #[serde(default)]
    pub kube_prism: KubePrism,
    /// Additional certificate SANs, placed first.
    #[serde(default)]
    pub cert_sans: Vec<String>,
    /// Extra patches for the control-plane base document.
    #[serde(default)]
    pub control_plane_patches: Vec<Value>,
    /// Extra patches for the worker base document.
    #[serde(default)]
    pub worker_patches: Vec<Value>,
    /// Client credentials for talosconfig.
    #[serde(default)]
    pub client: ClientCredentials,
    /// Control-plane nodes by key.
    #[serde(default)]
    pub control_planes: BTreeMap<String, NodeDescriptor>,
    /// Worker nodes by key.
    #[serde(default)]
    pub workers: BTreeMap<String, NodeDescriptor>,
}

fn default_talos_version() -> String {
    DEFAULT_TALOS_VERSION.to_string()
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

impl ClusterSpec {
    /// Create a cluster with no nodes and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            talos_version: default_talos_version(),
            registry: default_registry(),
            network: ClusterNetwork::default(),
            cni: CniSpec::default(),
            mesh: MeshSpec::default(),
            kube_prism: KubePrism::default(),
            cert_sans: Vec::new(),
            control_plane_patches: Vec::new(),
            worker_patches: Vec::new(),
            client: ClientCredentials::default(),
            control_planes: BTreeMap::new(),
            workers: BTreeMap::new(),
        }
    }

    /// Set the Talos version.
    #[must_use]
    pub fn with_talos_version(mut self, version: impl Into<String>) -> Self {
        self.talos_version = version.into();
        self
    }

    /// Set the CNI.
    #[must_use]
    pub fn with_cni(mut self, cni: CniSpec) -> Self {
        self.cni = cni;
        self
    }

    /// Set the mesh domain.
    #[must_use]
    pub fn with_mesh_domain(mut self, domain: impl Into<String>) -> Self {
        self.mesh.domain = Some(domain.into());
        self
    }

    /// Enable or disable `KubePrism`.
    #[must_use]
    pub fn with_kube_prism(mut self, enabled: bool) -> Self {
        self.kube_prism.enabled = enabled;
        self
    }

    /// Add a control-plane node.
    #[must_use]
    pub fn with_control_plane(mut self, key: impl Into<String>, node: NodeDescriptor) -> Self {
        self.control_planes.insert(key.into(), node);
        self
    }

    /// Add a worker node.
    #[must_use]
    pub fn with_worker(mut self, key: impl Into<String>, node: NodeDescriptor) -> Self {
        self.workers.insert(key.into(), node);
        self
    }

    /// Nodes of one role.
    #[must_use]
    pub fn nodes_of(&self, role: Role) -> &BTreeMap<String, NodeDescriptor> {
        match role {
            Role::ControlPlane => &self.control_planes,
            Role::Worker => &self.workers,
        }
    }

    /// All nodes, control planes first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeRef, &NodeDescriptor)> + '_ {
        [Role::ControlPlane, Role::Worker]
            .into_iter()
            .flat_map(move |role| {
                self.nodes_of(role)
                    .iter()
                    .map(move |(key, node)| (NodeRef::new(role, key.clone()), node))
            })
    }

    /// Caller-supplied extra patches for a role.
    #[must_use]
    pub fn patches_for(&self, role: Role) -> &[Value] {
        match role {
            Role::ControlPlane => &self.control_plane_patches,
            Role::Worker => &self.worker_patches,
        }
    }
}

/// Cluster-wide skeleton shared by both roles.
#[must_use]
pub fn skeleton(spec: &ClusterSpec, cert_sans: &[String]) -> Value {
    let sans = Value::from(cert_sans.to_vec());
    deep_merge(
        &empty(),
        &[
            at(
                &["machine", "features", "hostDNS"],
                mapping([
                    ("enabled", Value::Bool(true)),
                    ("forwardKubeDNSToHost", Value::Bool(true)),
                ]),
            ),
            at(&["machine", "certSANs"], sans.clone()),
            at(&["cluster", "clusterName"], Value::from(spec.name.as_str())),
            at(
                &["cluster", "controlPlane", "endpoint"],
                Value::from(spec.endpoint.as_str()),
            ),
            at(
                &["cluster", "network"],
                mapping([
                    ("cni", mapping([("name", Value::from(cni::DEFAULT_CNI))])),
                    ("podSubnets", Value::from(spec.network.pod_subnets.clone())),
                    (
                        "serviceSubnets",
                        Value::from(spec.network.service_subnets.clone()),
                    ),
                ]),
            ),
            at(&["cluster", "apiServer", "certSANs"], sans),
        ],
    )
}

/// Mesh patch: resolvers, search domain and the tunnel kernel module.
#[must_use]
pub fn mesh_patch(mesh: &MeshSpec) -> Value {
    let mut network = vec![(
        "nameservers",
        Value::from(MESH_NAMESERVERS.to_vec()),
    )];
    if let Some(domain) = mesh.domain.as_deref().filter(|d| !d.is_empty()) {
        network.push(("searchDomains", Value::from(vec![domain])));
    }

    deep_merge(
        &empty(),
        &[
            at(&["machine", "network"], mapping(network)),
            at(
                &["machine", "kernel", "modules"],
                Value::from(vec![mapping([("name", MESH_KERNEL_MODULE)])]),
            ),
        ],
    )
}

/// `KubePrism` patch: feature toggle, port and a label mirroring the state.
#[must_use]
pub fn kube_prism_patch(kube_prism: &KubePrism) -> Value {
    deep_merge(
        &empty(),
        &[
            at(
                &["machine", "features", "kubePrism"],
                mapping([
                    ("enabled", Value::Bool(kube_prism.enabled)),
                    ("port", Value::from(kube_prism.port)),
                ]),
            ),
            at(
                &["machine", "nodeLabels", KUBE_PRISM_LABEL],
                Value::from(kube_prism.enabled.to_string()),
            ),
        ],
    )
}

/// Base document for one role: skeleton, CNI override, mesh, `KubePrism`,
/// then the role's extra patches in order.
#[must_use]
pub fn base_document(spec: &ClusterSpec, role: Role, cert_sans: &[String]) -> Value {
    let mut patches = Vec::new();
    if let Some(cni_override) = cni::override_patch(&spec.cni) {
        patches.push(cni_override);
    }
    patches.push(mesh_patch(&spec.mesh));
    patches.push(kube_prism_patch(&spec.kube_prism));
    patches.extend(spec.patches_for(role).iter().cloned());

    deep_merge(&skeleton(spec, cert_sans), &patches)
}
