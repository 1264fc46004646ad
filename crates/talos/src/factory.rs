//! Schematic resolution against the Talos Image Factory.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::FactoryError;
use crate::schematic::{Schematic, SchematicIds, SchematicPlan};

/// Resolves schematics to Image Factory ids.
#[async_trait]
pub trait SchematicFactory: Send + Sync {
    /// Submit one schematic and return its id.
    async fn submit(&self, schematic: &Schematic) -> Result<String, FactoryError>;
}

/// Offline resolver: the id is the hex SHA-256 of the canonical YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentAddressed;

#[async_trait]
impl SchematicFactory for ContentAddressed {
    async fn submit(&self, schematic: &Schematic) -> Result<String, FactoryError> {
        content_id(schematic)
    }
}

/// Content-addressed id of a schematic.
///
/// # Errors
///
/// Returns an error if the schematic cannot be serialized.
pub fn content_id(schematic: &Schematic) -> Result<String, FactoryError> {
    let yaml = schematic.to_yaml()?;
    Ok(hex::encode(Sha256::digest(yaml.as_bytes())))
}

#[derive(Debug, Deserialize)]
struct SchematicResponse {
    id: String,
}

/// HTTP client for `POST /schematics` on an Image Factory.
#[derive(Debug, Clone)]
pub struct ImageFactoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl ImageFactoryClient {
    /// Create a client for the factory at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SchematicFactory for ImageFactoryClient {
    async fn submit(&self, schematic: &Schematic) -> Result<String, FactoryError> {
        let url = format!("{}/schematics", self.base_url);
        let body = schematic.to_yaml()?;

        debug!(url = %url, "Submitting schematic");
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/yaml")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FactoryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SchematicResponse = response.json().await?;
        Ok(parsed.id)
    }
}

/// Submit each distinct schematic in `plan` exactly once.
///
/// # Errors
///
/// Returns the first factory error encountered.
pub async fn resolve_schematics(
    plan: &SchematicPlan,
    factory: &dyn SchematicFactory,
) -> Result<SchematicIds, FactoryError> {
    let mut ids = SchematicIds::new();
    for (key, nodes) in plan.iter() {
        let id = factory.submit(&key.schematic()).await?;
        info!(schematic = %key, id = %id, nodes = nodes.len(), "Resolved schematic");
        ids.insert(key.clone(), id);
    }
    Ok(ids)
}
