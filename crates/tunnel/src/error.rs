//! Errors raised while rendering tunnel artifacts.

use thiserror::Error;

/// Errors from rendering tunnel documents.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// A YAML document could not be serialized.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON document could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
