//! Node descriptors for control-plane and worker machines.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Extension every node carries when none are listed.
pub const BASELINE_EXTENSION: &str = "siderolabs/tailscale";

/// Extension that requires the `zfs` kernel module.
pub const ZFS_EXTENSION: &str = "siderolabs/zfs";

/// Interface name used when a node does not specify one.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Talos platform assumed when a node names none.
pub const DEFAULT_PLATFORM: &str = "metal";

/// Hugepages reserved for the storage engine when not overridden.
pub const DEFAULT_HUGEPAGES: u32 = 1024;

/// Machine role within the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Runs etcd and the Kubernetes control plane.
    ControlPlane,
    /// Runs workloads only.
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlPlane => write!(f, "controlplane"),
            Self::Worker => write!(f, "worker"),
        }
    }
}

/// Hardware overlay (e.g. an SBC board support package).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Overlay {
    /// Overlay image, e.g. `siderolabs/sbc-raspberrypi`.
    pub image: String,
    /// Overlay name, e.g. `rpi_generic`.
    pub name: String,
}

impl Overlay {
    /// Create a new overlay reference.
    #[must_use]
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
        }
    }
}

/// Mesh network (Tailscale) addresses of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshAddresses {
    /// Mesh IPv4 address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,
    /// Mesh IPv6 address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,
}

/// ZFS vdev layout for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolLayout {
    /// Plain striped disks.
    #[default]
    Stripe,
    /// Mirrored disks.
    Mirror,
    /// Single parity.
    Raidz,
    /// Double parity.
    Raidz2,
}

impl PoolLayout {
    /// `zpool create` vdev keyword (stripes have none).
    #[must_use]
    pub fn vdev_keyword(self) -> Option<&'static str> {
        match self {
            Self::Stripe => None,
            Self::Mirror => Some("mirror"),
            Self::Raidz => Some("raidz"),
            Self::Raidz2 => Some("raidz2"),
        }
    }
}

/// A filesystem pool to create on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDefinition {
    /// Pool name.
    pub name: String,
    /// Vdev layout.
    #[serde(default)]
    pub layout: PoolLayout,
    /// Member disks (by-id paths recommended).
    pub disks: Vec<String>,
    /// Create the pool root dataset with native encryption.
    #[serde(default)]
    pub encrypted: bool,
    /// Extra `-O` dataset properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl PoolDefinition {
    /// Create a striped, unencrypted pool.
    #[must_use]
    pub fn new(name: impl Into<String>, disks: Vec<String>) -> Self {
        Self {
            name: name.into(),
            layout: PoolLayout::default(),
            disks,
            encrypted: false,
            properties: BTreeMap::new(),
        }
    }

    /// Set the vdev layout.
    #[must_use]
    pub fn with_layout(mut self, layout: PoolLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Enable native encryption.
    #[must_use]
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }
}

/// Worker storage parameters. Ignored on control-plane nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStorage {
    /// Run the block storage engine (Longhorn) on this node.
    #[serde(default)]
    pub enabled: bool,
    /// Dedicated disk for the storage engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    /// `vm.nr_hugepages` for the storage engine.
    #[serde(default = "default_hugepages")]
    pub hugepages: u32,
    /// Filesystem pools to set up.
    #[serde(default)]
    pub pools: Vec<PoolDefinition>,
}

fn default_hugepages() -> u32 {
    DEFAULT_HUGEPAGES
}

impl Default for WorkerStorage {
    fn default() -> Self {
        Self {
            enabled: false,
            disk: None,
            hugepages: DEFAULT_HUGEPAGES,
            pools: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn baseline_extensions() -> BTreeSet<String> {
    BTreeSet::from([BASELINE_EXTENSION.to_string()])
}

/// A single cluster node as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Primary address (used as talosctl node/endpoint).
    pub address: String,
    /// Secondary address; control planes expose it as an extra talosctl endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_address: Option<String>,
    /// Install disk (e.g. `/dev/sda`).
    pub install_disk: String,
    /// Wipe the install disk on install.
    #[serde(default)]
    pub wipe: bool,
    /// Hostname; the node key is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Network interface name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    /// Use DHCP on the interface.
    #[serde(default = "default_true")]
    pub dhcp: bool,
    /// Talos platform (`metal`, `aws`, ...); [`DEFAULT_PLATFORM`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// CPU architecture label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// OS label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    /// Topology region label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Topology zone label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Official system extensions baked into the installer image.
    #[serde(default = "baseline_extensions")]
    pub extensions: BTreeSet<String>,
    /// Optional hardware overlay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<Overlay>,
    /// Extra node labels; these override computed labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Mesh network addresses.
    #[serde(default)]
    pub mesh: MeshAddresses,
    /// Storage parameters (workers only).
    #[serde(default)]
    pub storage: WorkerStorage,
}

impl NodeDescriptor {
    /// Create a node with defaults for everything but address and install disk.
    #[must_use]
    pub fn new(address: impl Into<String>, install_disk: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secondary_address: None,
            install_disk: install_disk.into(),
            wipe: false,
            hostname: None,
            interface: None,
            dhcp: true,
            platform: None,
            arch: None,
            os: None,
            region: None,
            zone: None,
            extensions: baseline_extensions(),
            overlay: None,
            labels: BTreeMap::new(),
            mesh: MeshAddresses::default(),
            storage: WorkerStorage::default(),
        }
    }

    /// Set the hostname.
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the platform.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Replace the extension set.
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the hardware overlay.
    #[must_use]
    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// Add a node label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Set mesh addresses.
    #[must_use]
    pub fn with_mesh(mut self, ipv4: Option<&str>, ipv6: Option<&str>) -> Self {
        self.mesh = MeshAddresses {
            ipv4: ipv4.map(str::to_string),
            ipv6: ipv6.map(str::to_string),
        };
        self
    }

    /// Set worker storage.
    #[must_use]
    pub fn with_storage(mut self, storage: WorkerStorage) -> Self {
        self.storage = storage;
        self
    }

    /// Hostname, falling back to the node key.
    #[must_use]
    pub fn hostname_or<'a>(&'a self, key: &'a str) -> &'a str {
        self.hostname.as_deref().unwrap_or(key)
    }

    /// Interface name, falling back to [`DEFAULT_INTERFACE`].
    #[must_use]
    pub fn interface_name(&self) -> &str {
        self.interface.as_deref().unwrap_or(DEFAULT_INTERFACE)
    }

    /// Platform, falling back to [`DEFAULT_PLATFORM`].
    #[must_use]
    pub fn platform_name(&self) -> &str {
        self.platform.as_deref().unwrap_or(DEFAULT_PLATFORM)
    }

    /// Extension set with the baseline substituted for an empty set.
    #[must_use]
    pub fn effective_extensions(&self) -> BTreeSet<String> {
        if self.extensions.is_empty() {
            baseline_extensions()
        } else {
            self.extensions.clone()
        }
    }

    /// Whether the effective extension set contains `extension`.
    #[must_use]
    pub fn has_extension(&self, extension: &str) -> bool {
        if self.extensions.is_empty() {
            extension == BASELINE_EXTENSION
        } else {
            self.extensions.contains(extension)
        }
    }
}

/// `(role, key)` identity of a node; keys are only unique within a role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Node role.
    pub role: Role,
    /// Node key.
    pub key: String,
}

impl NodeRef {
    /// Create a node reference.
    #[must_use]
    pub fn new(role: Role, key: impl Into<String>) -> Self {
        Self {
            role,
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.role, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_from_yaml() {
        let node: NodeDescriptor =
            serde_yaml::from_str("address: 10.0.0.10\ninstall_disk: /dev/sda\n").unwrap();

        assert!(node.dhcp);
        assert!(!node.wipe);
        assert_eq!(node.interface_name(), "eth0");
        assert_eq!(node.platform_name(), "metal");
        assert_eq!(
            node.extensions,
            BTreeSet::from([BASELINE_EXTENSION.to_string()])
        );
        assert_eq!(node.storage.hugepages, DEFAULT_HUGEPAGES);
        assert!(node.storage.pools.is_empty());
    }

    #[test]
    fn test_hostname_falls_back_to_key() {
        let node = NodeDescriptor::new("10.0.0.10", "/dev/sda");
        assert_eq!(node.hostname_or("cp-1"), "cp-1");

        let node = node.with_hostname("alpha");
        assert_eq!(node.hostname_or("cp-1"), "alpha");
    }

    #[test]
    fn test_empty_extension_set_uses_baseline() {
        let node = NodeDescriptor::new("10.0.0.10", "/dev/sda").with_extensions(Vec::<String>::new());

        assert!(node.has_extension(BASELINE_EXTENSION));
        assert_eq!(node.effective_extensions().len(), 1);
    }

    #[test]
    fn test_pool_layout_keywords() {
        assert_eq!(PoolLayout::Stripe.vdev_keyword(), None);
        assert_eq!(PoolLayout::Mirror.vdev_keyword(), Some("mirror"));
        assert_eq!(PoolLayout::Raidz2.vdev_keyword(), Some("raidz2"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::ControlPlane.to_string(), "controlplane");
        assert_eq!(NodeRef::new(Role::Worker, "w-1").to_string(), "worker/w-1");
    }
}
