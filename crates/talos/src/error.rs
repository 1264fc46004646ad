//! Errors raised while composing machine configuration.

use thiserror::Error;

/// Errors from schematic resolution.
#[derive(Error, Debug)]
pub enum FactoryError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Factory returned an error response.
    #[error("Image Factory error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Schematic could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Errors from the machine config composer.
#[derive(Error, Debug)]
pub enum TalosError {
    /// Schematic resolution failed.
    #[error(transparent)]
    Factory(#[from] FactoryError),

    /// A node's schematic was not among the resolved ids.
    #[error("No schematic id resolved for node {0}")]
    MissingSchematic(String),

    /// A document could not be serialized.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A script template failed to parse.
    #[error("Template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    /// A script template failed to render.
    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),
}
