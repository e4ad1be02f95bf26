use clap::{Parser, ValueEnum};
use crawl_relay_core::safety::OutboundHttpSafety;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Same-origin relay for crawl endpoints.
///
/// The destination endpoint is supplied per request by the operator; nothing here changes
/// what is forwarded or how outcomes are reported.
#[derive(Debug, Clone, Parser)]
#[command(name = "crawl-relay", version, about, long_about = None)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "CRAWL_RELAY_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `crawl_relay_core=debug`).
    #[arg(long, env = "CRAWL_RELAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long,
        env = "CRAWL_RELAY_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    /// Only relay to these hosts (comma-separated, case-insensitive). Unset = any host.
    #[arg(
        long,
        env = "CRAWL_RELAY_OUTBOUND_ALLOWED_HOSTS",
        value_delimiter = ','
    )]
    pub outbound_allowed_hosts: Vec<String>,

    /// Refuse destinations on loopback/private/link-local/reserved addresses.
    #[arg(long, env = "CRAWL_RELAY_OUTBOUND_DENY_PRIVATE_NETWORKS")]
    pub outbound_deny_private_networks: bool,

    /// Fail relays whose response body exceeds this many bytes. Unset = unlimited.
    #[arg(long, env = "CRAWL_RELAY_OUTBOUND_MAX_RESPONSE_BYTES")]
    pub outbound_max_response_bytes: Option<usize>,
}

impl Config {
    /// Outbound policy derived from the flags; permissive unless narrowed.
    #[must_use]
    pub fn outbound_safety(&self) -> OutboundHttpSafety {
        let mut safety = OutboundHttpSafety::permissive()
            .with_allowed_hosts(&self.outbound_allowed_hosts);
        if self.outbound_deny_private_networks {
            safety.allow_private_networks = false;
        }
        safety.max_response_bytes = self.outbound_max_response_bytes;
        safety
    }
}
