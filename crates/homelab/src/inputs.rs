//! Descriptor loading and secret overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use flux::FluxSpec;
use talos::ClusterSpec;
use tunnel::TunnelSpec;

/// Combined descriptor; absent sections are skipped.
#[derive(Debug, Default, Deserialize)]
pub struct HomelabInputs {
    /// Cloudflare tunnel.
    #[serde(default)]
    pub tunnel: Option<TunnelSpec>,
    /// Talos cluster.
    #[serde(default)]
    pub talos: Option<ClusterSpec>,
    /// Flux bootstrap.
    #[serde(default)]
    pub flux: Option<FluxSpec>,
}

/// Parse a YAML descriptor.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read descriptor {}", path.display()))?;
    let parsed = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse descriptor {}", path.display()))?;

    info!(path = %path.display(), "Loaded descriptor");
    Ok(parsed)
}

/// Secrets supplied outside the descriptor; each one replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct SecretOverrides {
    /// Tailscale auth key.
    pub ts_authkey: Option<String>,
    /// SOPS age private key.
    pub age_key: Option<String>,
    /// Git token for Flux.
    pub git_token: Option<String>,
    /// Base64 tunnel secret.
    pub tunnel_secret: Option<String>,
}

impl SecretOverrides {
    /// Apply the tunnel secret.
    pub fn apply_tunnel(&self, spec: &mut TunnelSpec) {
        if let Some(secret) = &self.tunnel_secret {
            debug!("Using tunnel secret from environment");
            spec.secret = Some(secret.clone());
        }
    }

    /// Apply the Tailscale auth key.
    pub fn apply_talos(&self, spec: &mut ClusterSpec) {
        if let Some(auth_key) = &self.ts_authkey {
            debug!("Using Tailscale auth key from environment");
            spec.mesh.auth_key = Some(auth_key.clone());
        }
    }

    /// Apply the age key and git token.
    pub fn apply_flux(&self, spec: &mut FluxSpec) {
        if let Some(age_key) = &self.age_key {
            debug!("Using age key from environment");
            spec.sops.age_key = Some(age_key.clone());
        }
        if let Some(token) = &self.git_token {
            debug!("Using git token from environment");
            spec.git.token = Some(token.clone());
        }
    }

    /// Apply every override to whichever sections are present.
    pub fn apply(&self, inputs: &mut HomelabInputs) {
        if let Some(spec) = inputs.tunnel.as_mut() {
            self.apply_tunnel(spec);
        }
        if let Some(spec) = inputs.talos.as_mut() {
            self.apply_talos(spec);
        }
        if let Some(spec) = inputs.flux.as_mut() {
            self.apply_flux(spec);
        }
    }
}
