//! DNS records pointing public names at the tunnel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Suffix Cloudflare serves tunnel endpoints under.
pub const TUNNEL_DOMAIN_SUFFIX: &str = "cfargotunnel.com";

/// Automatic TTL.
pub const AUTO_TTL: u32 = 1;

/// The tunnel records point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelRef {
    /// Tunnel UUID.
    pub id: String,
    /// Tunnel display name.
    pub name: String,
}

impl TunnelRef {
    /// Reference a tunnel by id and name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// CNAME target for this tunnel.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}.{TUNNEL_DOMAIN_SUFFIX}", self.id)
    }
}

/// A requested record; unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordRequest {
    /// Record name; the map key when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Proxy through Cloudflare; `true` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxied: Option<bool>,
    /// TTL in seconds; automatic when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Record comment; a managed-route note when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A record in the shape the Cloudflare DNS API accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record name.
    pub name: String,
    /// Always `CNAME`.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Tunnel target.
    pub content: String,
    /// Proxied through Cloudflare.
    pub proxied: bool,
    /// TTL; `1` means automatic.
    pub ttl: u32,
    /// Record comment.
    pub comment: String,
}

/// One CNAME per request, in key order.
#[must_use]
pub fn compose_dns_records(
    requests: &BTreeMap<String, DnsRecordRequest>,
    tunnel: &TunnelRef,
) -> Vec<DnsRecord> {
    let target = tunnel.target();

    requests
        .iter()
        .map(|(key, request)| {
            let name = request.name.clone().unwrap_or_else(|| key.clone());
            let comment = request
                .comment
                .clone()
                .unwrap_or_else(|| format!("Managed tunnel route for {name} via {}", tunnel.name));

            DnsRecord {
                record_type: "CNAME".to_string(),
                content: target.clone(),
                proxied: request.proxied.unwrap_or(true),
                ttl: request.ttl.unwrap_or(AUTO_TTL),
                comment,
                name,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tunnel() -> TunnelRef {
        TunnelRef::new("6ff42ae2-765d-4adf-8112-31c55c1551ef", "homelab")
    }

    #[test]
    fn test_defaults_applied() {
        let requests = BTreeMap::from([("grafana".to_string(), DnsRecordRequest::default())]);

        let records = compose_dns_records(&requests, &tunnel());

        assert_eq!(
            records,
            vec![DnsRecord {
                name: "grafana".to_string(),
                record_type: "CNAME".to_string(),
                content: "6ff42ae2-765d-4adf-8112-31c55c1551ef.cfargotunnel.com".to_string(),
                proxied: true,
                ttl: 1,
                comment: "Managed tunnel route for grafana via homelab".to_string(),
            }]
        );
    }

    #[test]
    fn test_explicit_values_win() {
        let requests = BTreeMap::from([(
            "argo".to_string(),
            DnsRecordRequest {
                name: Some("argocd.example.com".to_string()),
                proxied: Some(false),
                ttl: Some(300),
                comment: Some("GitOps UI".to_string()),
            },
        )]);

        let records = compose_dns_records(&requests, &tunnel());

        assert_eq!(records[0].name, "argocd.example.com");
        assert!(!records[0].proxied);
        assert_eq!(records[0].ttl, 300);
        assert_eq!(records[0].comment, "GitOps UI");
    }

    #[test]
    fn test_default_comment_uses_explicit_name() {
        let requests = BTreeMap::from([(
            "argo".to_string(),
            DnsRecordRequest {
                name: Some("argocd.example.com".to_string()),
                ..Default::default()
            },
        )]);

        let records = compose_dns_records(&requests, &tunnel());

        assert_eq!(
            records[0].comment,
            "Managed tunnel route for argocd.example.com via homelab"
        );
    }

    #[test]
    fn test_one_record_per_request() {
        let requests: BTreeMap<_, _> = ["a", "b", "c"]
            .into_iter()
            .map(|k| (k.to_string(), DnsRecordRequest::default()))
            .collect();

        let records = compose_dns_records(&requests, &tunnel());

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.record_type == "CNAME"));
    }

    #[test]
    fn test_record_serializes_type_field() {
        let requests = BTreeMap::from([("web".to_string(), DnsRecordRequest::default())]);
        let json = serde_json::to_value(&compose_dns_records(&requests, &tunnel())[0]).unwrap();

        assert_eq!(json["type"], "CNAME");
        assert!(json.get("record_type").is_none());
    }
}
