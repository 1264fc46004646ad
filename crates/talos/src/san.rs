//! Certificate Subject Alternative Names for the API server and Talos API.

use std::net::IpAddr;

use crate::cluster::ClusterSpec;
use crate::node::{NodeDescriptor, Role};

/// Loopback entries every certificate carries, always last.
pub const LOOPBACK_SANS: [&str; 3] = ["127.0.0.1", "::1", "localhost"];

/// Empty strings and unspecified addresses stand in for "not assigned yet".
fn is_placeholder(address: &str) -> bool {
    let address = address.trim();
    address.is_empty()
        || address
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_unspecified())
}

fn node_sans(node: &NodeDescriptor, mesh_domain: Option<&str>) -> Vec<String> {
    let mut sans: Vec<String> = [node.mesh.ipv4.as_deref(), node.mesh.ipv6.as_deref()]
        .into_iter()
        .flatten()
        .filter(|address| !is_placeholder(address))
        .map(|address| address.trim().to_string())
        .collect();

    if let (Some(domain), Some(hostname)) = (
        mesh_domain.filter(|d| !d.is_empty()),
        node.hostname.as_deref().filter(|h| !h.is_empty()),
    ) {
        sans.push(format!("{hostname}.{domain}"));
    }
    sans
}

/// Derive the SAN list for a cluster.
///
/// Caller SANs come first (duplicates are kept), then mesh addresses and mesh
/// hostnames. Workers contribute only when `KubePrism` is enabled since the
/// balancer then runs on every node. The loopback entries close the list.
#[must_use]
pub fn cert_sans(spec: &ClusterSpec) -> Vec<String> {
    let mesh_domain = spec.mesh.domain.as_deref();
    let mut sans = spec.cert_sans.clone();

    sans.extend(
        spec.nodes()
            .filter(|(node_ref, _)| spec.kube_prism.enabled || node_ref.role == Role::ControlPlane)
            .flat_map(|(_, node)| node_sans(node, mesh_domain)),
    );

    sans.extend(LOOPBACK_SANS.iter().map(|s| (*s).to_string()));
    sans
}
