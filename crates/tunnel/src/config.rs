//! Tunnel configuration documents.
//!
//! Two renderings of the same ingress list are produced: the remotely
//! managed configuration accepted by the Cloudflare tunnel-configuration API,
//! and a locally managed `cloudflared` config file. Both carry the same
//! catch-all rule at the end.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dns::{compose_dns_records, DnsRecord, DnsRecordRequest, TunnelRef};
use crate::error::TunnelError;
use crate::ingress::{compose_ingress, IngressRule, OriginRequest, DEFAULT_SERVICE};

/// Where `cloudflared` reads its credentials when unset.
pub const DEFAULT_CREDENTIALS_FILE: &str = "/etc/cloudflared/credentials.json";

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_credentials_file() -> String {
    DEFAULT_CREDENTIALS_FILE.to_string()
}

/// Tunnel descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSpec {
    /// Tunnel display name.
    pub name: String,
    /// Tunnel UUID.
    pub id: String,
    /// Cloudflare account id; needed for the credentials file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Base64 tunnel secret; needed for the credentials file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Routing rules, in evaluation order.
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
    /// Catch-all service.
    #[serde(default = "default_service")]
    pub default_service: String,
    /// Origin settings applied to every rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequest>,
    /// Route private network traffic through the tunnel.
    #[serde(default)]
    pub warp_routing: bool,
    /// DNS records by key.
    #[serde(default)]
    pub dns: BTreeMap<String, DnsRecordRequest>,
    /// Credentials path inside the `cloudflared` container.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
}

impl TunnelSpec {
    /// Tunnel with no rules, records or credentials.
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            account_id: None,
            secret: None,
            ingress: Vec::new(),
            default_service: default_service(),
            origin_request: None,
            warp_routing: false,
            dns: BTreeMap::new(),
            credentials_file: default_credentials_file(),
        }
    }

    /// Add a routing rule.
    #[must_use]
    pub fn with_rule(mut self, rule: IngressRule) -> Self {
        self.ingress.push(rule);
        self
    }

    /// Add a DNS record request.
    #[must_use]
    pub fn with_record(mut self, key: impl Into<String>, request: DnsRecordRequest) -> Self {
        self.dns.insert(key.into(), request);
        self
    }

    /// Reference used by DNS records.
    #[must_use]
    pub fn tunnel_ref(&self) -> TunnelRef {
        TunnelRef::new(&self.id, &self.name)
    }
}

/// `warp-routing` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpRouting {
    /// Whether private network routing is on.
    pub enabled: bool,
}

/// Body of the tunnel-configuration API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfiguration {
    /// Rules, catch-all last.
    pub ingress: Vec<IngressRule>,
    /// Set only when warp routing is enabled.
    #[serde(
        rename = "warp-routing",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub warp_routing: Option<WarpRouting>,
    /// Tunnel-wide origin defaults.
    #[serde(
        rename = "originRequest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_request: Option<OriginRequest>,
}

/// Remotely managed tunnel configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfigDocument {
    /// Configuration body.
    pub config: TunnelConfiguration,
}

/// Locally managed `cloudflared` config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudflaredConfig {
    /// Tunnel UUID.
    pub tunnel: String,
    /// Credentials file path.
    #[serde(rename = "credentials-file")]
    pub credentials_file: String,
    /// Tunnel-wide origin defaults.
    #[serde(
        rename = "originRequest",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub origin_request: Option<OriginRequest>,
    /// Set only when warp routing is enabled.
    #[serde(
        rename = "warp-routing",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub warp_routing: Option<WarpRouting>,
    /// Rules, catch-all last.
    pub ingress: Vec<IngressRule>,
}

/// Contents of the `cloudflared` credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelCredentials {
    /// Cloudflare account id.
    #[serde(rename = "AccountTag")]
    pub account_tag: String,
    /// Tunnel UUID.
    #[serde(rename = "TunnelID")]
    pub tunnel_id: String,
    /// Base64 tunnel secret.
    #[serde(rename = "TunnelSecret")]
    pub tunnel_secret: String,
}

/// Everything composed for one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelOutput {
    /// Remotely managed configuration.
    pub config: TunnelConfigDocument,
    /// CNAME records pointing at the tunnel.
    pub dns_records: Vec<DnsRecord>,
    /// Locally managed `cloudflared` config.
    pub cloudflared: CloudflaredConfig,
    /// Present only when both account id and secret are known.
    pub credentials: Option<TunnelCredentials>,
}

impl TunnelOutput {
    /// Tunnel configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn config_yaml(&self) -> Result<String, TunnelError> {
        Ok(serde_yaml::to_string(&self.config)?)
    }

    /// DNS records as a YAML list.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn dns_yaml(&self) -> Result<String, TunnelError> {
        Ok(serde_yaml::to_string(&self.dns_records)?)
    }

    /// `cloudflared` config file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn cloudflared_yaml(&self) -> Result<String, TunnelError> {
        render_cloudflared_config(&self.cloudflared)
    }

    /// Credentials file, if credentials are known.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn credentials_json(&self) -> Result<Option<String>, TunnelError> {
        self.credentials
            .as_ref()
            .map(serde_json::to_string_pretty)
            .transpose()
            .map_err(TunnelError::from)
    }
}

/// Render a `cloudflared` config file.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_cloudflared_config(config: &CloudflaredConfig) -> Result<String, TunnelError> {
    Ok(serde_yaml::to_string(config)?)
}

/// Composes tunnel documents from a [`TunnelSpec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TunnelComposer;

impl TunnelComposer {
    /// Compose the configuration, DNS records and `cloudflared` files.
    #[must_use]
    pub fn compose(spec: &TunnelSpec) -> TunnelOutput {
        let ingress = compose_ingress(&spec.ingress, &spec.default_service);
        let warp_routing = spec.warp_routing.then_some(WarpRouting { enabled: true });
        let origin_request = spec
            .origin_request
            .clone()
            .filter(|origin| !origin.is_empty());
        debug!(
            tunnel = %spec.name,
            rules = ingress.len(),
            default_service = %spec.default_service,
            "Composed ingress"
        );

        let dns_records = compose_dns_records(&spec.dns, &spec.tunnel_ref());

        let credentials = match (spec.account_id.as_deref(), spec.secret.as_deref()) {
            (Some(account), Some(secret)) => Some(TunnelCredentials {
                account_tag: account.to_string(),
                tunnel_id: spec.id.clone(),
                tunnel_secret: secret.to_string(),
            }),
            _ => None,
        };

        info!(
            tunnel = %spec.name,
            records = dns_records.len(),
            credentials = credentials.is_some(),
            "Composed tunnel"
        );

        TunnelOutput {
            cloudflared: CloudflaredConfig {
                tunnel: spec.id.clone(),
                credentials_file: spec.credentials_file.clone(),
                origin_request: origin_request.clone(),
                warp_routing,
                ingress: ingress.clone(),
            },
            config: TunnelConfigDocument {
                config: TunnelConfiguration {
                    ingress,
                    warp_routing,
                    origin_request,
                },
            },
            dns_records,
            credentials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> TunnelSpec {
        TunnelSpec::new("homelab", "6ff42ae2-765d-4adf-8112-31c55c1551ef")
            .with_rule(IngressRule::new("grafana.example.com", "http://grafana:3000"))
            .with_record("grafana.example.com", DnsRecordRequest::default())
    }

    #[test]
    fn test_config_document_shape() {
        let output = TunnelComposer::compose(&spec());

        assert_eq!(
            output.config_yaml().unwrap(),
            "config:\n  ingress:\n  - hostname: grafana.example.com\n    service: http://grafana:3000\n  - service: http_status:404\n"
        );
    }

    #[test]
    fn test_warp_routing_and_origin_defaults() {
        let mut spec = spec();
        spec.warp_routing = true;
        spec.origin_request = Some(OriginRequest {
            connect_timeout: Some(10),
            ..Default::default()
        });

        let output = TunnelComposer::compose(&spec);
        let value = serde_yaml::to_value(&output.config).unwrap();

        assert_eq!(value["config"]["warp-routing"]["enabled"], serde_yaml::Value::Bool(true));
        assert_eq!(
            value["config"]["originRequest"]["connectTimeout"],
            serde_yaml::Value::from(10_u32)
        );
    }

    #[test]
    fn test_empty_origin_request_is_dropped() {
        let mut spec = spec();
        spec.origin_request = Some(OriginRequest::default());

        let output = TunnelComposer::compose(&spec);
        assert!(output.config.config.origin_request.is_none());
        assert!(output.cloudflared.origin_request.is_none());
    }

    #[test]
    fn test_cloudflared_config() {
        let output = TunnelComposer::compose(&spec());
        let yaml = output.cloudflared_yaml().unwrap();

        assert!(yaml.starts_with(
            "tunnel: 6ff42ae2-765d-4adf-8112-31c55c1551ef\ncredentials-file: /etc/cloudflared/credentials.json\n"
        ));
        assert_eq!(output.cloudflared.ingress, output.config.config.ingress);
    }

    #[test]
    fn test_credentials_need_account_and_secret() {
        let mut spec = spec();
        spec.account_id = Some("acc123".to_string());
        assert!(TunnelComposer::compose(&spec).credentials.is_none());

        spec.secret = Some("c2VjcmV0".to_string());
        let output = TunnelComposer::compose(&spec);
        let json: serde_json::Value =
            serde_json::from_str(&output.credentials_json().unwrap().unwrap()).unwrap();

        assert_eq!(json["AccountTag"], "acc123");
        assert_eq!(json["TunnelID"], "6ff42ae2-765d-4adf-8112-31c55c1551ef");
        assert_eq!(json["TunnelSecret"], "c2VjcmV0");
    }

    #[test]
    fn test_spec_from_yaml_defaults() {
        let spec: TunnelSpec = serde_yaml::from_str(
            "name: homelab\nid: abc\ningress:\n  - hostname: a.example.com\n    service: http://a:80\n",
        )
        .unwrap();

        assert_eq!(spec.default_service, DEFAULT_SERVICE);
        assert_eq!(spec.credentials_file, DEFAULT_CREDENTIALS_FILE);
        assert!(!spec.warp_routing);
        assert_eq!(spec.ingress.len(), 1);
    }
}
