//! Flux GitOps bootstrap composer.
//!
//! Declares the install order (cert-manager, the Flux operator, the SOPS and
//! git secrets, then a `FluxInstance`) and composes each document. Nothing is
//! applied here; dependencies are stated for the tool that applies them.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod error;
pub mod instance;
pub mod plan;
pub mod release;
pub mod secret;
pub mod spec;

pub use bootstrap::{compose_bootstrap, FluxBootstrap};
pub use error::FluxError;
pub use instance::{compose_instance, FluxInstance, BASE_COMPONENTS};
pub use plan::{install_plan, InstallStep, StepKind};
pub use release::HelmRelease;
pub use secret::Secret;
pub use spec::FluxSpec;
