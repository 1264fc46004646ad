//! `FluxInstance` descriptor consumed by the Flux operator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::spec::FluxSpec;

/// Controllers every instance runs, in order.
pub const BASE_COMPONENTS: [&str; 4] = [
    "source-controller",
    "kustomize-controller",
    "helm-controller",
    "notification-controller",
];

/// How often the instance re-syncs the repository.
pub const SYNC_INTERVAL: &str = "1m";

/// Kubernetes object metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name.
    pub name: String,
    /// Object namespace.
    pub namespace: String,
}

/// Flux distribution to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Version constraint (e.g. `2.x`).
    pub version: String,
    /// Image registry.
    pub registry: String,
}

/// Cluster the controllers run in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSettings {
    /// Cluster flavour.
    #[serde(rename = "type")]
    pub cluster_type: String,
    /// Install the controllers' network policies.
    pub network_policy: bool,
    /// Cluster DNS domain.
    pub domain: String,
}

/// Repository the instance syncs from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sync {
    /// Source kind.
    pub kind: String,
    /// Clone URL.
    pub url: String,
    /// Full branch ref.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Path inside the repository.
    pub path: String,
    /// Reconcile interval.
    pub interval: String,
    /// Secret holding the git credentials.
    pub pull_secret: String,
}

/// Resource a patch applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchTarget {
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
}

/// A JSON6902 patch applied to the instance's own resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KustomizePatch {
    /// Patched resource.
    pub target: PatchTarget,
    /// JSON6902 operations as YAML.
    pub patch: String,
}

/// Kustomize settings for the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kustomize {
    /// Patches, applied in order.
    pub patches: Vec<KustomizePatch>,
}

/// `spec` of a `FluxInstance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxInstanceSpec {
    /// Distribution to install.
    pub distribution: Distribution,
    /// Controllers, base ones first.
    pub components: Vec<String>,
    /// Cluster settings.
    pub cluster: ClusterSettings,
    /// Repository sync.
    pub sync: Sync,
    /// Patches for the synced resources.
    pub kustomize: Kustomize,
}

/// `fluxcd.controlplane.io/v1` `FluxInstance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxInstance {
    /// Always `fluxcd.controlplane.io/v1`.
    pub api_version: String,
    /// Always `FluxInstance`.
    pub kind: String,
    /// Name and namespace.
    pub metadata: ObjectMeta,
    /// Instance settings.
    pub spec: FluxInstanceSpec,
}

/// JSON6902 operations adding SOPS decryption to a `Kustomization`.
#[must_use]
pub fn decryption_patch(secret_name: &str) -> String {
    format!(
        r"- op: add
  path: /spec/decryption
  value:
    provider: sops
    secretRef:
      name: {secret_name}
"
    )
}

/// Build the instance descriptor.
#[must_use]
pub fn compose_instance(spec: &FluxSpec) -> FluxInstance {
    let components = BASE_COMPONENTS
        .iter()
        .map(|c| (*c).to_string())
        .chain(spec.extra_components.iter().cloned())
        .collect::<Vec<_>>();
    debug!(components = components.len(), url = %spec.repository.url(), "Composing FluxInstance");

    FluxInstance {
        api_version: "fluxcd.controlplane.io/v1".to_string(),
        kind: "FluxInstance".to_string(),
        metadata: ObjectMeta {
            name: "flux".to_string(),
            namespace: spec.namespace.clone(),
        },
        spec: FluxInstanceSpec {
            distribution: Distribution {
                version: spec.version.clone(),
                registry: spec.registry.clone(),
            },
            components,
            cluster: ClusterSettings {
                cluster_type: "kubernetes".to_string(),
                network_policy: true,
                domain: spec.cluster_domain.clone(),
            },
            sync: Sync {
                kind: "GitRepository".to_string(),
                url: spec.repository.url(),
                git_ref: spec.repository.git_ref(),
                path: spec.repository.path.clone(),
                interval: SYNC_INTERVAL.to_string(),
                pull_secret: spec.git.secret_name.clone(),
            },
            kustomize: Kustomize {
                patches: vec![KustomizePatch {
                    target: PatchTarget {
                        kind: "Kustomization".to_string(),
                        name: spec.kustomization.clone(),
                    },
                    patch: decryption_patch(&spec.sops.secret_name),
                }],
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_base_then_extras() {
        let spec = FluxSpec::new("homelab-infra", "fleet")
            .with_component("image-reflector-controller")
            .with_component("image-automation-controller");

        let instance = compose_instance(&spec);

        assert_eq!(
            instance.spec.components,
            vec![
                "source-controller",
                "kustomize-controller",
                "helm-controller",
                "notification-controller",
                "image-reflector-controller",
                "image-automation-controller",
            ]
        );
    }

    #[test]
    fn test_sync_block() {
        let spec = FluxSpec::new("homelab-infra", "fleet").with_path("clusters/homelab");

        let sync = compose_instance(&spec).spec.sync;

        assert_eq!(sync.url, "https://github.com/homelab-infra/fleet.git");
        assert_eq!(sync.git_ref, "refs/heads/main");
        assert_eq!(sync.path, "clusters/homelab");
        assert_eq!(sync.interval, "1m");
        assert_eq!(sync.pull_secret, "git-credentials");
    }

    #[test]
    fn test_decryption_patch_targets_kustomization() {
        let mut spec = FluxSpec::new("homelab-infra", "fleet");
        spec.kustomization = "apps".to_string();

        let patches = compose_instance(&spec).spec.kustomize.patches;

        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].target.kind, "Kustomization");
        assert_eq!(patches[0].target.name, "apps");

        let ops: serde_yaml::Value = serde_yaml::from_str(&patches[0].patch).unwrap();
        assert_eq!(ops[0]["op"], serde_yaml::Value::from("add"));
        assert_eq!(ops[0]["path"], serde_yaml::Value::from("/spec/decryption"));
        assert_eq!(ops[0]["value"]["provider"], serde_yaml::Value::from("sops"));
        assert_eq!(
            ops[0]["value"]["secretRef"]["name"],
            serde_yaml::Value::from("sops-age")
        );
    }

    #[test]
    fn test_manifest_header() {
        let yaml = serde_yaml::to_string(&compose_instance(&FluxSpec::new("o", "r"))).unwrap();

        assert!(yaml.starts_with(
            "apiVersion: fluxcd.controlplane.io/v1\nkind: FluxInstance\nmetadata:\n  name: flux\n  namespace: flux-system\n"
        ));
        assert!(yaml.contains("  sync:\n    kind: GitRepository\n"));
        assert!(yaml.contains("    ref: refs/heads/main\n"));
        assert!(yaml.contains("    pullSecret: git-credentials\n"));
    }
}
