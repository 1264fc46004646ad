//! Errors raised while rendering bootstrap manifests.

use thiserror::Error;

/// Errors from rendering bootstrap documents.
#[derive(Error, Debug)]
pub enum FluxError {
    /// A manifest could not be serialized.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
