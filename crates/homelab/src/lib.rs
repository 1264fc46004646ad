//! Homelab configuration front end.
//!
//! Loads descriptors, runs the tunnel, Talos and Flux composers and writes
//! their documents under one output directory.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifacts;
pub mod inputs;
pub mod output;

use anyhow::{Context, Result};
use tracing::info;

use flux::FluxSpec;
use talos::{ClusterSpec, ContentAddressed, ImageFactoryClient, SchematicFactory};
use tunnel::{TunnelComposer, TunnelSpec};

pub use inputs::{HomelabInputs, SecretOverrides};
pub use output::ArtifactWriter;

/// Image Factory client for `url`, or the offline resolver without one.
#[must_use]
pub fn schematic_factory(url: Option<&str>) -> Box<dyn SchematicFactory> {
    match url {
        Some(url) => {
            info!(url = %url, "Resolving schematics via Image Factory");
            Box::new(ImageFactoryClient::new(url))
        }
        None => {
            info!("Resolving schematics offline (content-addressed)");
            Box::new(ContentAddressed)
        }
    }
}

/// Compose and write tunnel artifacts.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn run_tunnel(spec: &TunnelSpec, writer: &mut ArtifactWriter) -> Result<()> {
    let output = TunnelComposer::compose(spec);
    artifacts::write_tunnel(writer, &output)
}

/// Compose and write Talos artifacts.
///
/// # Errors
/// Returns an error if schematic resolution, rendering or writing fails.
pub async fn run_talos(
    spec: &ClusterSpec,
    factory: &dyn SchematicFactory,
    writer: &mut ArtifactWriter,
) -> Result<()> {
    let configs = talos::compose(spec, factory)
        .await
        .with_context(|| format!("Failed to compose machine configs for {}", spec.name))?;
    artifacts::write_talos(writer, &configs)
}

/// Compose and write Flux artifacts.
///
/// # Errors
/// Returns an error if rendering or writing fails.
pub fn run_flux(spec: &FluxSpec, writer: &mut ArtifactWriter) -> Result<()> {
    let bootstrap = flux::compose_bootstrap(spec);
    artifacts::write_flux(writer, &bootstrap)
}

/// Run every composer whose section is present.
///
/// # Errors
/// Returns an error if any composer fails.
pub async fn run_all(
    inputs: &HomelabInputs,
    factory: &dyn SchematicFactory,
    writer: &mut ArtifactWriter,
) -> Result<()> {
    if let Some(spec) = &inputs.tunnel {
        run_tunnel(spec, writer)?;
    }
    if let Some(spec) = &inputs.talos {
        run_talos(spec, factory, writer).await?;
    }
    if let Some(spec) = &inputs.flux {
        run_flux(spec, writer)?;
    }
    Ok(())
}
