//! Lays out composer output on disk.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use flux::FluxBootstrap;
use talos::MachineConfigs;
use tunnel::TunnelOutput;

use crate::output::ArtifactWriter;

fn yaml<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_yaml::to_string(value).with_context(|| format!("Failed to serialize {what}"))
}

/// `tunnel/` artifacts.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn write_tunnel(writer: &mut ArtifactWriter, output: &TunnelOutput) -> Result<()> {
    let dir = Path::new("tunnel");
    writer.write(dir.join("tunnel-config.yaml"), &output.config_yaml()?)?;
    writer.write(dir.join("dns-records.yaml"), &output.dns_yaml()?)?;
    writer.write(dir.join("cloudflared.yaml"), &output.cloudflared_yaml()?)?;
    if let Some(credentials) = output.credentials_json()? {
        writer.write(dir.join("credentials.json"), &credentials)?;
    }

    info!(
        records = output.dns_records.len(),
        rules = output.config.config.ingress.len(),
        "Wrote tunnel artifacts"
    );
    Ok(())
}

/// `talos/` artifacts, including per-node documents and pool scripts.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn write_talos(writer: &mut ArtifactWriter, configs: &MachineConfigs) -> Result<()> {
    let dir = Path::new("talos");
    let control_plane = yaml(&configs.control_plane, "control-plane base")?;
    let worker = yaml(&configs.worker, "worker base")?;

    writer.write(dir.join("controlplane.yaml"), &control_plane)?;
    writer.write(dir.join("worker.yaml"), &worker)?;
    writer.write(dir.join("talosconfig"), &yaml(&configs.client_config, "talosconfig")?)?;
    writer.write(dir.join("schematics.yaml"), &yaml(&configs.schematics, "schematics")?)?;
    if let Some(values) = &configs.cni_values {
        writer.write(dir.join("cilium-values.yaml"), &yaml(values, "CNI values")?)?;
    }

    for node in &configs.nodes {
        let node_dir = dir
            .join("nodes")
            .join(node.node.role.to_string())
            .join(&node.node.key);
        let base = match node.node.role {
            talos::Role::ControlPlane => &control_plane,
            talos::Role::Worker => &worker,
        };

        writer.write(node_dir.join("base.yaml"), base)?;
        writer.write(node_dir.join("patch.yaml"), &yaml(&node.patch, "node patch")?)?;
        if let Some(service) = &node.extension_service {
            writer.write(
                node_dir.join("extension-service.yaml"),
                &yaml(service, "extension service")?,
            )?;
        }
    }

    for script in &configs.pool_scripts {
        writer.write_executable(
            dir.join("scripts").join(format!("{}-pools.sh", script.node.key)),
            &script.script,
        )?;
    }

    info!(
        nodes = configs.nodes.len(),
        schematics = configs.schematics.len(),
        pool_scripts = configs.pool_scripts.len(),
        "Wrote Talos artifacts"
    );
    Ok(())
}

/// `flux/` artifacts.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn write_flux(writer: &mut ArtifactWriter, bootstrap: &FluxBootstrap) -> Result<()> {
    let dir = Path::new("flux");
    writer.write(dir.join("install-order.yaml"), &bootstrap.plan_yaml()?)?;
    writer.write(dir.join("helm-releases.yaml"), &bootstrap.releases_yaml()?)?;
    writer.write(dir.join("secrets.yaml"), &bootstrap.secrets_yaml()?)?;
    writer.write(dir.join("flux-instance.yaml"), &bootstrap.instance_yaml()?)?;

    info!(steps = bootstrap.plan.len(), "Wrote Flux artifacts");
    Ok(())
}
