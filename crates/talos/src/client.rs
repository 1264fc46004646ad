//! talosctl client configuration (talosconfig).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterSpec;

/// A talosconfig context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    /// Control-plane endpoints.
    pub endpoints: Vec<String>,
    /// Nodes targeted by default.
    pub nodes: Vec<String>,
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

/// talosconfig document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalosClientConfig {
    /// Active context.
    pub context: String,
    /// Contexts by name.
    pub contexts: BTreeMap<String, ClientContext>,
}

impl TalosClientConfig {
    /// Build a single-context config for the cluster.
    ///
    /// Endpoints are the control-plane addresses followed by their secondary
    /// addresses; nodes are every node's primary address.
    #[must_use]
    pub fn for_cluster(spec: &ClusterSpec) -> Self {
        let primaries = spec.control_planes.values().map(|node| node.address.clone());
        let secondaries = spec
            .control_planes
            .values()
            .filter_map(|node| node.secondary_address.clone());

        let context = ClientContext {
            endpoints: primaries.chain(secondaries).collect(),
            nodes: spec.nodes().map(|(_, node)| node.address.clone()).collect(),
            ca: spec.client.ca.clone(),
            crt: spec.client.crt.clone(),
            key: spec.client.key.clone(),
        };

        Self {
            context: spec.name.clone(),
            contexts: BTreeMap::from([(spec.name.clone(), context)]),
        }
    }
}
