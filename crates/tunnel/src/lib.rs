//! Cloudflare Tunnel composer.
//!
//! Turns a [`TunnelSpec`] into the ingress configuration a tunnel serves,
//! the CNAME records that point public hostnames at it and, optionally, a
//! locally managed `cloudflared` config with its credentials file.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dns;
pub mod error;
pub mod ingress;

pub use config::{
    render_cloudflared_config, CloudflaredConfig, TunnelComposer, TunnelConfigDocument,
    TunnelCredentials, TunnelOutput, TunnelSpec,
};
pub use dns::{compose_dns_records, DnsRecord, DnsRecordRequest, TunnelRef};
pub use error::TunnelError;
pub use ingress::{compose_ingress, IngressRule, OriginRequest, DEFAULT_SERVICE};
