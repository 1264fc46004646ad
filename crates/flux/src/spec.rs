//! Bootstrap descriptor.

use serde::{Deserialize, Serialize};

/// Namespace Flux runs in.
pub const FLUX_NAMESPACE: &str = "flux-system";

/// Default Flux distribution version.
pub const DEFAULT_FLUX_VERSION: &str = "2.x";

/// Default registry the distribution is pulled from.
pub const DEFAULT_REGISTRY: &str = "ghcr.io/fluxcd";

fn default_branch() -> String {
    "main".to_string()
}

fn default_path() -> String {
    "./".to_string()
}

fn default_namespace() -> String {
    FLUX_NAMESPACE.to_string()
}

fn default_version() -> String {
    DEFAULT_FLUX_VERSION.to_string()
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_cluster_domain() -> String {
    "cluster.local".to_string()
}

fn default_sops_secret() -> String {
    "sops-age".to_string()
}

fn default_git_secret() -> String {
    "git-credentials".to_string()
}

fn default_git_username() -> String {
    "git".to_string()
}

fn default_kustomization() -> String {
    FLUX_NAMESPACE.to_string()
}

/// GitHub repository Flux syncs from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    /// GitHub user or organisation.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Branch to sync.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Path inside the repository.
    #[serde(default = "default_path")]
    pub path: String,
}

impl RepositorySpec {
    /// HTTPS clone URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.name)
    }

    /// Full branch ref.
    #[must_use]
    pub fn git_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }
}

/// SOPS age key secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SopsSpec {
    /// Secret name.
    #[serde(default = "default_sops_secret")]
    pub secret_name: String,
    /// Private age key (`AGE-SECRET-KEY-...`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_key: Option<String>,
}

impl Default for SopsSpec {
    fn default() -> Self {
        Self {
            secret_name: default_sops_secret(),
            age_key: None,
        }
    }
}

/// Git credentials secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCredentials {
    /// Secret name.
    #[serde(default = "default_git_secret")]
    pub secret_name: String,
    /// Git username.
    #[serde(default = "default_git_username")]
    pub username: String,
    /// Personal access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for GitCredentials {
    fn default() -> Self {
        Self {
            secret_name: default_git_secret(),
            username: default_git_username(),
            token: None,
        }
    }
}

/// A pinned Helm chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Pinned chart version.
    pub version: String,
    /// Release namespace.
    pub namespace: String,
}

/// Chart versions installed before the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charts {
    /// cert-manager chart.
    #[serde(default = "Charts::default_cert_manager")]
    pub cert_manager: ChartSpec,
    /// Flux operator chart.
    #[serde(default = "Charts::default_flux_operator")]
    pub flux_operator: ChartSpec,
}

impl Charts {
    fn default_cert_manager() -> ChartSpec {
        ChartSpec {
            version: "v1.16.2".to_string(),
            namespace: "cert-manager".to_string(),
        }
    }

    fn default_flux_operator() -> ChartSpec {
        ChartSpec {
            version: "0.13.0".to_string(),
            namespace: FLUX_NAMESPACE.to_string(),
        }
    }
}

impl Default for Charts {
    fn default() -> Self {
        Self {
            cert_manager: Self::default_cert_manager(),
            flux_operator: Self::default_flux_operator(),
        }
    }
}

/// Flux bootstrap descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluxSpec {
    /// Repository to sync.
    pub repository: RepositorySpec,
    /// Namespace Flux runs in.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Distribution version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Distribution registry.
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Controllers beyond the four base ones.
    #[serde(default)]
    pub extra_components: Vec<String>,
    /// Cluster DNS domain.
    #[serde(default = "default_cluster_domain")]
    pub cluster_domain: String,
    /// SOPS age key secret.
    #[serde(default)]
    pub sops: SopsSpec,
    /// Git credentials secret.
    #[serde(default)]
    pub git: GitCredentials,
    /// Kustomization the decryption patch targets.
    #[serde(default = "default_kustomization")]
    pub kustomization: String,
    /// Charts installed first.
    #[serde(default)]
    pub charts: Charts,
}

impl FluxSpec {
    /// Sync `owner/name` on `main` at the repository root.
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repository: RepositorySpec {
                owner: owner.into(),
                name: name.into(),
                branch: default_branch(),
                path: default_path(),
            },
            namespace: default_namespace(),
            version: default_version(),
            registry: default_registry(),
            extra_components: Vec::new(),
            cluster_domain: default_cluster_domain(),
            sops: SopsSpec::default(),
            git: GitCredentials::default(),
            kustomization: default_kustomization(),
            charts: Charts::default(),
        }
    }

    /// Sync a subdirectory.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.repository.path = path.into();
        self
    }

    /// Sync another branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.repository.branch = branch.into();
        self
    }

    /// Add a controller to the base set.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.extra_components.push(component.into());
        self
    }
}
