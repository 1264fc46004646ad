//! Installer image references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default Talos version.
pub const DEFAULT_TALOS_VERSION: &str = "v1.9.0";

/// Talos Image Factory registry root.
pub const DEFAULT_REGISTRY: &str = "factory.talos.dev";

/// Talos Image Factory API base URL.
pub const IMAGE_FACTORY_URL: &str = "https://factory.talos.dev";

/// Installer type used for unknown or unset platforms.
pub const DEFAULT_INSTALLER_TYPE: &str = "installer";

/// Installer image name for a Talos platform.
///
/// Platforms the factory publishes a dedicated installer for map to
/// `<platform>-installer`; anything else gets the generic installer.
#[must_use]
pub fn installer_type(platform: Option<&str>) -> &'static str {
    match platform.map(str::to_ascii_lowercase).as_deref() {
        Some("metal") => "metal-installer",
        Some("aws") => "aws-installer",
        Some("azure") => "azure-installer",
        Some("gcp") => "gcp-installer",
        Some("hcloud") => "hcloud-installer",
        Some("digital-ocean") => "digital-ocean-installer",
        Some("nocloud") => "nocloud-installer",
        Some("openstack") => "openstack-installer",
        Some("oracle") => "oracle-installer",
        Some("vmware") => "vmware-installer",
        _ => DEFAULT_INSTALLER_TYPE,
    }
}

/// Fully qualified installer image for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerImage {
    /// Registry root (e.g. `factory.talos.dev`).
    pub registry: String,
    /// Installer type (e.g. `metal-installer`).
    pub installer_type: String,
    /// Schematic ID from the Image Factory.
    pub schematic_id: String,
    /// Talos version tag (e.g. "v1.9.0").
    pub version: String,
}

impl InstallerImage {
    /// Create an installer image reference on the default registry.
    #[must_use]
    pub fn new(
        platform: Option<&str>,
        schematic_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            installer_type: installer_type(platform).to_string(),
            schematic_id: schematic_id.into(),
            version: version.into(),
        }
    }

    /// Use a different registry root (e.g. a pull-through mirror).
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into().trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Display for InstallerImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}:{}",
            self.registry, self.installer_type, self.schematic_id, self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installer_type_lookup() {
        assert_eq!(installer_type(Some("metal")), "metal-installer");
        assert_eq!(installer_type(Some("AWS")), "aws-installer");
        assert_eq!(installer_type(Some("commodore64")), DEFAULT_INSTALLER_TYPE);
        assert_eq!(installer_type(None), DEFAULT_INSTALLER_TYPE);
    }

    #[test]
    fn test_default_image_reference() {
        let image = InstallerImage::new(Some("metal"), "abc123", DEFAULT_TALOS_VERSION);

        assert_eq!(
            image.to_string(),
            "factory.talos.dev/metal-installer/abc123:v1.9.0"
        );
    }

    #[test]
    fn test_custom_registry() {
        let image =
            InstallerImage::new(None, "abc123", "v1.8.0").with_registry("registry.lan:5000/");

        assert_eq!(image.to_string(), "registry.lan:5000/installer/abc123:v1.8.0");
    }
}
