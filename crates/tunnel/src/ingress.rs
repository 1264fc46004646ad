//! Ingress rules routed by the tunnel connector.
//!
//! Rules are evaluated top to bottom by `cloudflared`; the last rule must
//! match everything, so [`compose_ingress`] always appends one.

use serde::{Deserialize, Serialize};

/// Service answering requests no other rule matched.
pub const DEFAULT_SERVICE: &str = "http_status:404";

/// Origin connection tuning, shared by rules and tunnel-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginRequest {
    /// Seconds to wait for a TCP connection to the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<u32>,
    /// Seconds to wait for a TLS handshake with the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_timeout: Option<u32>,
    /// TCP keep-alive interval in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_keep_alive: Option<u32>,
    /// Idle keep-alive connection pool size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_connections: Option<u32>,
    /// Seconds an idle keep-alive connection stays open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_timeout: Option<u32>,
    /// Overrides the `Host` header sent to the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_host_header: Option<String>,
    /// Hostname expected on the origin certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_server_name: Option<String>,
    /// CA bundle used to verify the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_pool: Option<String>,
    /// Skip origin certificate verification.
    #[serde(
        rename = "noTLSVerify",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub no_tls_verify: Option<bool>,
    /// Disable Happy Eyeballs for IPv4/IPv6 fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_happy_eyeballs: Option<bool>,
    /// Disable chunked transfer encoding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_chunked_encoding: Option<bool>,
    /// Speak HTTP/2 to the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http2_origin: Option<bool>,
}

impl OriginRequest {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One hostname/path to service mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressRule {
    /// Public hostname; `None` matches every host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Target service (e.g. `http://traefik.kube-system:80`).
    pub service: String,
    /// Path regex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Per-rule origin settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_request: Option<OriginRequest>,
}

impl IngressRule {
    /// Route `hostname` to `service`.
    #[must_use]
    pub fn new(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            service: service.into(),
            path: None,
            origin_request: None,
        }
    }

    /// Rule matching every request.
    #[must_use]
    pub fn catch_all(service: impl Into<String>) -> Self {
        Self {
            hostname: None,
            service: service.into(),
            path: None,
            origin_request: None,
        }
    }

    /// Restrict the rule to a path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach origin settings.
    #[must_use]
    pub fn with_origin_request(mut self, origin_request: OriginRequest) -> Self {
        self.origin_request = Some(origin_request);
        self
    }
}

/// Caller rules in order, then a catch-all for `default_service`.
///
/// The catch-all is appended even if a caller rule already matches
/// everything.
#[must_use]
pub fn compose_ingress(rules: &[IngressRule], default_service: &str) -> Vec<IngressRule> {
    rules
        .iter()
        .cloned()
        .chain(std::iter::once(IngressRule::catch_all(default_service)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_all_is_last() {
        let rules = vec![
            IngressRule::new("grafana.example.com", "http://grafana:3000"),
            IngressRule::new("argo.example.com", "https://argocd-server:443").with_path("^/api"),
        ];

        let composed = compose_ingress(&rules, DEFAULT_SERVICE);

        assert_eq!(composed.len(), 3);
        assert_eq!(&composed[..2], rules.as_slice());
        assert_eq!(composed[2], IngressRule::catch_all("http_status:404"));
    }

    #[test]
    fn test_empty_rules_yield_only_catch_all() {
        let composed = compose_ingress(&[], "http://fallback:8080");
        assert_eq!(composed, vec![IngressRule::catch_all("http://fallback:8080")]);
    }

    #[test]
    fn test_catch_all_appended_after_existing_wildcard() {
        let rules = vec![IngressRule::catch_all("http://web:80")];
        let composed = compose_ingress(&rules, DEFAULT_SERVICE);

        assert_eq!(composed.len(), 2);
        assert_eq!(composed[1].service, DEFAULT_SERVICE);
    }

    #[test]
    fn test_rule_serialization() {
        let rule = IngressRule::new("argo.example.com", "https://argocd-server:443")
            .with_origin_request(OriginRequest {
                no_tls_verify: Some(true),
                connect_timeout: Some(30),
                ..Default::default()
            });

        let yaml = serde_yaml::to_string(&rule).unwrap();
        assert_eq!(
            yaml,
            "hostname: argo.example.com\nservice: https://argocd-server:443\noriginRequest:\n  connectTimeout: 30\n  noTLSVerify: true\n"
        );

        let catch_all = serde_yaml::to_string(&IngressRule::catch_all(DEFAULT_SERVICE)).unwrap();
        assert_eq!(catch_all, "service: http_status:404\n");
    }
}
