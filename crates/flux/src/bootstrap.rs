//! Everything a bootstrap run produces, and its YAML renderings.

use serde::Serialize;
use tracing::info;

use crate::error::FluxError;
use crate::instance::{compose_instance, FluxInstance};
use crate::plan::{install_plan, InstallStep};
use crate::release::{self, HelmRelease};
use crate::secret::{self, Secret};
use crate::spec::FluxSpec;

/// Composed bootstrap documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxBootstrap {
    /// Install order.
    pub plan: Vec<InstallStep>,
    /// Chart installs.
    pub releases: Vec<HelmRelease>,
    /// Secrets, SOPS first.
    pub secrets: Vec<Secret>,
    /// The `FluxInstance`.
    pub instance: FluxInstance,
}

/// Compose the plan, chart installs, secrets and instance.
#[must_use]
pub fn compose_bootstrap(spec: &FluxSpec) -> FluxBootstrap {
    let bootstrap = FluxBootstrap {
        plan: install_plan(spec),
        releases: vec![release::cert_manager(spec), release::flux_operator(spec)],
        secrets: vec![secret::sops_secret(spec), secret::git_secret(spec)],
        instance: compose_instance(spec),
    };

    info!(
        repository = %spec.repository.url(),
        steps = bootstrap.plan.len(),
        components = bootstrap.instance.spec.components.len(),
        "Composed Flux bootstrap"
    );
    bootstrap
}

/// Join documents into one multi-document YAML stream.
///
/// # Errors
///
/// Returns an error if any document fails to serialize.
pub fn multi_document<T: Serialize>(documents: &[T]) -> Result<String, FluxError> {
    let mut out = String::new();
    for document in documents {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(document)?);
    }
    Ok(out)
}

impl FluxBootstrap {
    /// Install order.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn plan_yaml(&self) -> Result<String, FluxError> {
        Ok(serde_yaml::to_string(&self.plan)?)
    }

    /// Chart installs.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn releases_yaml(&self) -> Result<String, FluxError> {
        Ok(serde_yaml::to_string(&self.releases)?)
    }

    /// Secret manifests as one stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn secrets_yaml(&self) -> Result<String, FluxError> {
        multi_document(&self.secrets)
    }

    /// `FluxInstance` manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn instance_yaml(&self) -> Result<String, FluxError> {
        Ok(serde_yaml::to_string(&self.instance)?)
    }
}
