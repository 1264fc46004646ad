//! Machine configuration composition for a whole cluster.

use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, info};

use crate::client::TalosClientConfig;
use crate::cluster::{base_document, ClusterSpec};
use crate::cni;
use crate::error::TalosError;
use crate::extension::{tailscale_service, ExtensionServiceConfig};
use crate::factory::{resolve_schematics, SchematicFactory};
use crate::installer::InstallerImage;
use crate::node::{NodeRef, Role};
use crate::patch::node_patch;
use crate::san::cert_sans;
use crate::schematic::{Schematic, SchematicIds, SchematicKey, SchematicPlan};
use crate::storage::{PoolScript, PoolScriptRenderer};

/// Composed documents for one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Node identity.
    pub node: NodeRef,
    /// Primary address.
    pub address: String,
    /// Installer image the node installs from.
    pub installer_image: InstallerImage,
    /// Node-specific patch applied on top of the role's base document.
    pub patch: Value,
    /// Tailscale extension service config, if the node runs it.
    pub extension_service: Option<ExtensionServiceConfig>,
}

/// A resolved schematic and the nodes built from it.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedSchematic {
    /// Image Factory id.
    pub id: String,
    /// Schematic document.
    pub schematic: Schematic,
    /// Nodes using it.
    pub nodes: Vec<NodeRef>,
}

/// Everything the composer produces for a cluster.
#[derive(Debug, Clone)]
pub struct MachineConfigs {
    /// Control-plane base document.
    pub control_plane: Value,
    /// Worker base document.
    pub worker: Value,
    /// Per-node documents, control planes first.
    pub nodes: Vec<NodeConfig>,
    /// One entry per distinct schematic.
    pub schematics: Vec<ResolvedSchematic>,
    /// Derived certificate SANs.
    pub cert_sans: Vec<String>,
    /// talosconfig.
    pub client_config: TalosClientConfig,
    /// CNI Helm values (non-default CNI only).
    pub cni_values: Option<Value>,
    /// Pool setup scripts for workers with pools.
    pub pool_scripts: Vec<PoolScript>,
}

impl MachineConfigs {
    /// Base document for a role.
    #[must_use]
    pub fn base_for(&self, role: Role) -> &Value {
        match role {
            Role::ControlPlane => &self.control_plane,
            Role::Worker => &self.worker,
        }
    }

    /// Documents for a node.
    #[must_use]
    pub fn node(&self, role: Role, key: &str) -> Option<&NodeConfig> {
        self.nodes
            .iter()
            .find(|config| config.node.role == role && config.node.key == key)
    }
}

/// Resolve schematics through `factory`, then compose every document.
///
/// # Errors
///
/// Returns an error if schematic resolution or rendering fails.
pub async fn compose(
    spec: &ClusterSpec,
    factory: &dyn SchematicFactory,
) -> Result<MachineConfigs, TalosError> {
    let plan = SchematicPlan::from_nodes(spec.nodes());
    info!(
        cluster = %spec.name,
        nodes = spec.nodes().count(),
        schematics = plan.len(),
        "Planned schematics"
    );

    let ids = resolve_schematics(&plan, factory).await?;
    compose_with_ids(spec, &plan, &ids)
}

/// Compose every document from already-resolved schematic ids.
///
/// # Errors
///
/// Returns an error if a node's schematic id is missing or a pool script
/// fails to render.
pub fn compose_with_ids(
    spec: &ClusterSpec,
    plan: &SchematicPlan,
    ids: &SchematicIds,
) -> Result<MachineConfigs, TalosError> {
    let sans = cert_sans(spec);
    let renderer = PoolScriptRenderer::new()?;

    let mut nodes = Vec::new();
    let mut pool_scripts = Vec::new();
    for (node_ref, node) in spec.nodes() {
        let key = SchematicKey::for_node(node);
        let schematic_id = ids
            .get(&key)
            .ok_or_else(|| TalosError::MissingSchematic(node_ref.to_string()))?;

        let installer_image =
            InstallerImage::new(Some(node.platform_name()), schematic_id, &spec.talos_version)
                .with_registry(&spec.registry);
        debug!(node = %node_ref, image = %installer_image, "Composing node patch");

        if node_ref.role == Role::Worker {
            pool_scripts.extend(renderer.render(&node_ref, node)?);
        }

        nodes.push(NodeConfig {
            patch: node_patch(&node_ref, node, &installer_image),
            extension_service: tailscale_service(&node_ref.key, node, &spec.mesh),
            address: node.address.clone(),
            installer_image,
            node: node_ref,
        });
    }

    let schematics = plan
        .iter()
        .filter_map(|(key, refs)| {
            ids.get(key).map(|id| ResolvedSchematic {
                id: id.clone(),
                schematic: key.schematic(),
                nodes: refs.to_vec(),
            })
        })
        .collect();

    let configs = MachineConfigs {
        control_plane: base_document(spec, Role::ControlPlane, &sans),
        worker: base_document(spec, Role::Worker, &sans),
        nodes,
        schematics,
        cert_sans: sans,
        client_config: TalosClientConfig::for_cluster(spec),
        cni_values: cni::values_document(&spec.cni, &spec.kube_prism),
        pool_scripts,
    };

    info!(
        cluster = %spec.name,
        nodes = configs.nodes.len(),
        pool_scripts = configs.pool_scripts.len(),
        cni = %spec.cni.name,
        "Composed machine configs"
    );
    Ok(configs)
}
