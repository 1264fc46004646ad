//! Homelab CLI - compose tunnel, Talos and Flux configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flux::FluxSpec;
use homelab::inputs::{self, HomelabInputs, SecretOverrides};
use homelab::{run_all, run_flux, run_talos, run_tunnel, schematic_factory, ArtifactWriter};
use talos::ClusterSpec;
use tunnel::TunnelSpec;

/// Homelab CLI - compose tunnel, Talos and Flux configuration.
#[derive(Parser)]
#[command(name = "homelab")]
#[command(about = "Generate Cloudflare Tunnel, Talos and Flux configuration", version)]
struct Cli {
    /// Descriptor file.
    #[arg(short, long, global = true, default_value = "homelab.yaml")]
    input: PathBuf,

    /// Output directory (or set `HOMELAB_OUTPUT_DIR`).
    #[arg(short, long, global = true, env = "HOMELAB_OUTPUT_DIR", default_value = "out")]
    output: PathBuf,

    /// Image Factory URL; schematic ids are computed offline when unset.
    #[arg(long, global = true, env = "TALOS_FACTORY_URL")]
    factory_url: Option<String>,

    /// Tailscale auth key (or set `TS_AUTHKEY`).
    #[arg(long, global = true, env = "TS_AUTHKEY", hide_env_values = true)]
    ts_authkey: Option<String>,

    /// SOPS age private key (or set `SOPS_AGE_KEY`).
    #[arg(long, global = true, env = "SOPS_AGE_KEY", hide_env_values = true)]
    age_key: Option<String>,

    /// Git token for Flux (or set `GITHUB_TOKEN`).
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    git_token: Option<String>,

    /// Tunnel secret (or set `TUNNEL_SECRET`).
    #[arg(long, global = true, env = "TUNNEL_SECRET", hide_env_values = true)]
    tunnel_secret: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose tunnel ingress, DNS records and cloudflared config.
    Tunnel,

    /// Compose Talos machine configs, schematics and pool scripts.
    Talos,

    /// Compose the Flux bootstrap plan and instance.
    Flux,

    /// Run every composer with a section in a combined descriptor.
    All,
}

impl Cli {
    fn overrides(&self) -> SecretOverrides {
        SecretOverrides {
            ts_authkey: self.ts_authkey.clone(),
            age_key: self.age_key.clone(),
            git_token: self.git_token.clone(),
            tunnel_secret: self.tunnel_secret.clone(),
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let overrides = cli.overrides();
    let mut writer = ArtifactWriter::new(&cli.output);

    match cli.command {
        Commands::Tunnel => {
            let mut spec: TunnelSpec = inputs::load(&cli.input)?;
            overrides.apply_tunnel(&mut spec);
            run_tunnel(&spec, &mut writer)?;
        }

        Commands::Talos => {
            let mut spec: ClusterSpec = inputs::load(&cli.input)?;
            overrides.apply_talos(&mut spec);
            let factory = schematic_factory(cli.factory_url.as_deref());
            run_talos(&spec, factory.as_ref(), &mut writer).await?;
        }

        Commands::Flux => {
            let mut spec: FluxSpec = inputs::load(&cli.input)?;
            overrides.apply_flux(&mut spec);
            run_flux(&spec, &mut writer)?;
        }

        Commands::All => {
            let mut combined: HomelabInputs = inputs::load(&cli.input)?;
            overrides.apply(&mut combined);
            let factory = schematic_factory(cli.factory_url.as_deref());
            run_all(&combined, factory.as_ref(), &mut writer).await?;
        }
    }

    info!(
        output = %writer.root().display(),
        files = writer.written().len(),
        "Done"
    );
    Ok(())
}
