//! Installation order.
//!
//! Steps are only declared here; whatever applies them is responsible for
//! honouring `depends_on`.

use serde::{Deserialize, Serialize};

use crate::spec::FluxSpec;

/// cert-manager release step.
pub const CERT_MANAGER: &str = "cert-manager";
/// Flux operator release step.
pub const FLUX_OPERATOR: &str = "flux-operator";
/// Final `FluxInstance` step.
pub const FLUX_INSTANCE: &str = "flux-instance";

/// What a step installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// A Helm chart release.
    HelmRelease,
    /// A Kubernetes `Secret`.
    Secret,
    /// The `FluxInstance` resource.
    FluxInstance,
}

/// One installation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallStep {
    /// Step name; other steps depend on it by this name.
    pub name: String,
    /// What the step installs.
    pub kind: StepKind,
    /// Target namespace.
    pub namespace: String,
    /// Steps that must finish first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl InstallStep {
    fn new(name: &str, kind: StepKind, namespace: &str, depends_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            namespace: namespace.to_string(),
            depends_on: depends_on.iter().map(|d| (*d).to_string()).collect(),
        }
    }
}

/// cert-manager, the operator, both secrets, then the instance.
#[must_use]
pub fn install_plan(spec: &FluxSpec) -> Vec<InstallStep> {
    let sops = spec.sops.secret_name.as_str();
    let git = spec.git.secret_name.as_str();

    vec![
        InstallStep::new(
            CERT_MANAGER,
            StepKind::HelmRelease,
            &spec.charts.cert_manager.namespace,
            &[],
        ),
        InstallStep::new(
            FLUX_OPERATOR,
            StepKind::HelmRelease,
            &spec.charts.flux_operator.namespace,
            &[CERT_MANAGER],
        ),
        InstallStep::new(sops, StepKind::Secret, &spec.namespace, &[]),
        InstallStep::new(git, StepKind::Secret, &spec.namespace, &[]),
        InstallStep::new(
            FLUX_INSTANCE,
            StepKind::FluxInstance,
            &spec.namespace,
            &[FLUX_OPERATOR, sops, git],
        ),
    ]
}
