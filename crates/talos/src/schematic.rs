//! Image Factory schematics and their de-duplication across nodes.
//!
//! Every node needs an installer image built from its extension set and
//! optional overlay. Nodes with the same combination share one schematic, so
//! the plan groups nodes by a structured [`SchematicKey`] and the factory is
//! asked once per group.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::{NodeDescriptor, NodeRef, Overlay};

/// Canonical identity of a schematic: sorted extensions plus overlay.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchematicKey {
    extensions: Vec<String>,
    overlay: Option<Overlay>,
}

impl SchematicKey {
    /// Build a key from any extension list; order and duplicates are normalised.
    #[must_use]
    pub fn new<I, S>(extensions: I, overlay: Option<Overlay>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut extensions: Vec<String> = extensions.into_iter().map(Into::into).collect();
        extensions.sort();
        extensions.dedup();
        Self {
            extensions,
            overlay,
        }
    }

    /// Key for a node's effective extensions and overlay.
    #[must_use]
    pub fn for_node(node: &NodeDescriptor) -> Self {
        Self::new(node.effective_extensions(), node.overlay.clone())
    }

    /// Sorted extension list.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Overlay, if any.
    #[must_use]
    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Build request document for this key.
    #[must_use]
    pub fn schematic(&self) -> Schematic {
        Schematic {
            overlay: self.overlay.clone(),
            customization: Customization {
                system_extensions: SystemExtensions {
                    official_extensions: self.extensions.clone(),
                },
            },
        }
    }
}

impl fmt::Display for SchematicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.extensions)?;
        match &self.overlay {
            Some(overlay) => write!(f, " overlay={:?}@{:?}", overlay.name, overlay.image),
            None => write!(f, " overlay=none"),
        }
    }
}

/// Image Factory schematic document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schematic {
    /// Hardware overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
    /// Image customization.
    pub customization: Customization,
}

/// `customization` block of a schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    /// System extensions.
    pub system_extensions: SystemExtensions,
}

/// `systemExtensions` block of a schematic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemExtensions {
    /// Official extension names (e.g. `siderolabs/tailscale`).
    pub official_extensions: Vec<String>,
}

impl Schematic {
    /// Canonical YAML rendering submitted to the factory.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Nodes grouped by the schematic they need.
#[derive(Debug, Clone, Default)]
pub struct SchematicPlan {
    entries: BTreeMap<SchematicKey, Vec<NodeRef>>,
}

impl SchematicPlan {
    /// Group nodes by schematic key.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (NodeRef, &'a NodeDescriptor)>,
    {
        let mut entries: BTreeMap<SchematicKey, Vec<NodeRef>> = BTreeMap::new();
        for (node_ref, node) in nodes {
            entries
                .entry(SchematicKey::for_node(node))
                .or_default()
                .push(node_ref);
        }
        Self { entries }
    }

    /// Number of distinct schematics (build requests).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over keys and the nodes sharing them.
    pub fn iter(&self) -> impl Iterator<Item = (&SchematicKey, &[NodeRef])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Nodes that share `key`.
    #[must_use]
    pub fn nodes_for(&self, key: &SchematicKey) -> &[NodeRef] {
        self.entries.get(key).map_or(&[], Vec::as_slice)
    }
}

/// Resolved schematic ids keyed by schematic.
pub type SchematicIds = BTreeMap<SchematicKey, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Role;

    fn node(extensions: &[&str]) -> NodeDescriptor {
        NodeDescriptor::new("10.0.0.1", "/dev/sda").with_extensions(extensions.iter().copied())
    }

    #[test]
    fn test_key_is_order_independent() {
        let a = SchematicKey::new(["siderolabs/zfs", "siderolabs/tailscale"], None);
        let b = SchematicKey::new(["siderolabs/tailscale", "siderolabs/zfs", "siderolabs/zfs"], None);

        assert_eq!(a, b);
        assert_eq!(a.extensions(), ["siderolabs/tailscale", "siderolabs/zfs"]);
    }

    #[test]
    fn test_overlay_distinguishes_keys() {
        let plain = SchematicKey::new(["siderolabs/tailscale"], None);
        let rpi = SchematicKey::new(
            ["siderolabs/tailscale"],
            Some(Overlay::new("siderolabs/sbc-raspberrypi", "rpi_generic")),
        );

        assert_ne!(plain, rpi);
    }

    #[test]
    fn test_delimiter_in_extension_name_does_not_collide() {
        let joined = SchematicKey::new(["a,b"], None);
        let split = SchematicKey::new(["a", "b"], None);

        assert_ne!(joined, split);
    }

    #[test]
    fn test_plan_groups_identical_nodes() {
        let shared = node(&["siderolabs/tailscale", "siderolabs/zfs"]);
        let shared_reordered = node(&["siderolabs/zfs", "siderolabs/tailscale"]);
        let other = node(&["siderolabs/tailscale"]);

        let plan = SchematicPlan::from_nodes([
            (NodeRef::new(Role::Worker, "w-1"), &shared),
            (NodeRef::new(Role::Worker, "w-2"), &shared_reordered),
            (NodeRef::new(Role::ControlPlane, "cp-1"), &other),
        ]);

        assert_eq!(plan.len(), 2);
        let key = SchematicKey::for_node(&shared);
        assert_eq!(plan.nodes_for(&key).len(), 2);
    }

    #[test]
    fn test_schematic_yaml_shape() {
        let key = SchematicKey::new(
            ["siderolabs/tailscale"],
            Some(Overlay::new("siderolabs/sbc-raspberrypi", "rpi_generic")),
        );
        let yaml = key.schematic().to_yaml().unwrap();

        assert_eq!(
            yaml,
            "overlay:\n  image: siderolabs/sbc-raspberrypi\n  name: rpi_generic\ncustomization:\n  systemExtensions:\n    officialExtensions:\n    - siderolabs/tailscale\n"
        );
    }

    #[test]
    fn test_schematic_without_overlay_omits_block() {
        let yaml = SchematicKey::new(["siderolabs/tailscale"], None)
            .schematic()
            .to_yaml()
            .unwrap();
        assert!(!yaml.contains("overlay"));
    }
}
