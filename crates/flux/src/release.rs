//! Helm charts installed ahead of the instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::plan::{CERT_MANAGER, FLUX_OPERATOR};
use crate::spec::FluxSpec;

/// cert-manager chart repository.
pub const CERT_MANAGER_REPOSITORY: &str = "https://charts.jetstack.io";
/// Flux operator OCI chart repository.
pub const FLUX_OPERATOR_REPOSITORY: &str = "oci://ghcr.io/controlplaneio-fluxcd/charts";

/// A chart install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRelease {
    /// Release name.
    pub name: String,
    /// Target namespace.
    pub namespace: String,
    /// Chart repository URL.
    pub repository: String,
    /// Chart name.
    pub chart: String,
    /// Pinned chart version.
    pub version: String,
    /// Create the namespace when missing.
    pub create_namespace: bool,
    /// Chart values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, Value>,
    /// Releases that must be ready first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// cert-manager with its CRDs.
#[must_use]
pub fn cert_manager(spec: &FluxSpec) -> HelmRelease {
    let mut crds = serde_yaml::Mapping::new();
    crds.insert("enabled".into(), Value::Bool(true));

    HelmRelease {
        name: CERT_MANAGER.to_string(),
        namespace: spec.charts.cert_manager.namespace.clone(),
        repository: CERT_MANAGER_REPOSITORY.to_string(),
        chart: CERT_MANAGER.to_string(),
        version: spec.charts.cert_manager.version.clone(),
        create_namespace: true,
        values: BTreeMap::from([("crds".to_string(), Value::Mapping(crds))]),
        depends_on: Vec::new(),
    }
}

/// The Flux operator, after cert-manager.
#[must_use]
pub fn flux_operator(spec: &FluxSpec) -> HelmRelease {
    HelmRelease {
        name: FLUX_OPERATOR.to_string(),
        namespace: spec.charts.flux_operator.namespace.clone(),
        repository: FLUX_OPERATOR_REPOSITORY.to_string(),
        chart: FLUX_OPERATOR.to_string(),
        version: spec.charts.flux_operator.version.clone(),
        create_namespace: true,
        values: BTreeMap::new(),
        depends_on: vec![CERT_MANAGER.to_string()],
    }
}
