//! Talos Linux machine configuration composer.
//!
//! Builds, for every control-plane and worker node, a shared per-role base
//! document plus a node-specific patch. Along the way it de-duplicates Image
//! Factory schematics across nodes, derives each node's installer image and
//! computes the certificate SAN list.
//!
//! # Example
//!
//! ```rust,ignore
//! use talos::{compose, ClusterSpec, ContentAddressed, NodeDescriptor};
//!
//! let spec = ClusterSpec::new("homelab", "https://10.0.0.10:6443")
//!     .with_control_plane("cp-1", NodeDescriptor::new("10.0.0.10", "/dev/sda"));
//!
//! let configs = compose(&spec, &ContentAddressed).await?;
//! println!("{}", serde_yaml::to_string(&configs.control_plane)?);
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod cluster;
pub mod cni;
pub mod composer;
pub mod error;
pub mod extension;
pub mod factory;
pub mod installer;
pub mod merge;
pub mod node;
pub mod patch;
pub mod san;
pub mod schematic;
pub mod storage;

pub use client::TalosClientConfig;
pub use cluster::{ClusterSpec, KubePrism, MeshSpec};
pub use cni::CniSpec;
pub use composer::{compose, compose_with_ids, MachineConfigs, NodeConfig, ResolvedSchematic};
pub use error::{FactoryError, TalosError};
pub use extension::ExtensionServiceConfig;
pub use factory::{ContentAddressed, ImageFactoryClient, SchematicFactory};
pub use installer::{InstallerImage, DEFAULT_TALOS_VERSION, IMAGE_FACTORY_URL};
pub use node::{NodeDescriptor, NodeRef, Overlay, PoolDefinition, PoolLayout, Role, WorkerStorage};
pub use schematic::{Schematic, SchematicKey, SchematicPlan};
pub use storage::PoolScript;
