//! Outbound destination policy (host allowlist, private-network blocking, size limits) and
//! redaction of endpoint URLs in messages and logs.
//!
//! The relay defaults to [`OutboundHttpSafety::permissive`], which lets every http(s)
//! destination through. Deployments that expose the relay beyond a single operator can
//! opt into [`OutboundHttpSafety::restricted`].

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use tokio::net::lookup_host;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectPolicy {
    /// Do not follow redirects; the 3xx response is relayed as-is.
    None,
    /// Follow redirects, re-checking every hop against the policy.
    Checked,
}

/// Reason a destination was refused before any request was made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Outbound HTTP blocked: unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("Outbound HTTP blocked: missing URL host")]
    MissingHost,
    #[error("Outbound HTTP blocked: host '{0}' not in allowlist")]
    HostNotAllowed(String),
    #[error("Outbound HTTP blocked: host '{host}' resolved to disallowed IP '{ip}'")]
    DeniedAddress { host: String, ip: IpAddr },
    #[error("DNS lookup failed for host '{host}': {reason}")]
    Dns { host: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct OutboundHttpSafety {
    /// If set, only these hosts are allowed (compared lowercase).
    pub allowed_hosts: Option<HashSet<String>>,
    /// If true, loopback/private/link-local/reserved destinations are allowed.
    pub allow_private_networks: bool,
    /// Maximum response body size in bytes. `None` = unlimited.
    pub max_response_bytes: Option<usize>,
    pub redirects: RedirectPolicy,
}

impl Default for OutboundHttpSafety {
    fn default() -> Self {
        Self::permissive()
    }
}

impl OutboundHttpSafety {
    /// Transparent conduit: any http(s) host, any address, any body size.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allowed_hosts: None,
            allow_private_networks: true,
            max_response_bytes: None,
            redirects: RedirectPolicy::Checked,
        }
    }

    /// Public destinations only, 1 MiB responses, no redirects.
    #[must_use]
    pub fn restricted() -> Self {
        Self {
            allowed_hosts: None,
            allow_private_networks: false,
            max_response_bytes: Some(1024 * 1024),
            redirects: RedirectPolicy::None,
        }
    }

    /// Restrict destinations to the given hosts. An empty iterator leaves the allowlist unset.
    #[must_use]
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        self.allowed_hosts = (!set.is_empty()).then_some(set);
        self
    }

    /// Check a destination before connecting to it.
    ///
    /// # Errors
    ///
    /// Returns the violated rule: non-`http(s)` scheme, missing host, host outside the
    /// allowlist, or (when private networks are disallowed) a hostname that resolves to a
    /// disallowed address.
    pub async fn check_url(&self, url: &Url) -> Result<(), PolicyViolation> {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(PolicyViolation::UnsupportedScheme(scheme.to_string()));
        }

        let Some(host) = url.host_str() else {
            return Err(PolicyViolation::MissingHost);
        };

        if let Some(allowed) = &self.allowed_hosts
            && !allowed.contains(&host.to_ascii_lowercase())
        {
            return Err(PolicyViolation::HostNotAllowed(host.to_string()));
        }

        if self.allow_private_networks {
            return Ok(());
        }

        // IPv6 literals come back bracketed from `host_str`.
        let literal = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return if is_denied_ip(ip) {
                Err(PolicyViolation::DeniedAddress {
                    host: host.to_string(),
                    ip,
                })
            } else {
                Ok(())
            };
        }

        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = lookup_host((host, port))
            .await
            .map_err(|e| PolicyViolation::Dns {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        let mut resolved = false;
        for addr in addrs {
            resolved = true;
            if is_denied_ip(addr.ip()) {
                return Err(PolicyViolation::DeniedAddress {
                    host: host.to_string(),
                    ip: addr.ip(),
                });
            }
        }
        if !resolved {
            return Err(PolicyViolation::Dns {
                host: host.to_string(),
                reason: "no addresses returned".to_string(),
            });
        }

        Ok(())
    }
}

/// Drop credentials, query and fragment from a URL.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

/// Redact an endpoint that may not even parse; unparseable input is replaced wholesale.
#[must_use]
pub fn redact_endpoint(endpoint: &str) -> String {
    Url::parse(endpoint).map_or_else(|_| "<invalid url>".to_string(), |u| redact_url(&u))
}

/// A reqwest error message, followed by its chain of causes, with the request URL redacted.
///
/// reqwest's own text ("error sending request for url ...") is the same for DNS failures,
/// refused connections and timeouts; the distinguishing detail lives in the sources.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !text.is_empty() && !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = cause.source();
    }
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

fn is_denied_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_denied_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_denied_ipv4(v4),
            None => is_denied_ipv6(v6),
        },
    }
}

fn is_denied_ipv4(ip: Ipv4Addr) -> bool {
    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
    {
        return true;
    }

    let oct = ip.octets();
    // 100.64.0.0/10 (CGNAT) and 240.0.0.0/4 (reserved).
    (oct[0] == 100 && (64..=127).contains(&oct[1])) || oct[0] >= 240
}

fn is_denied_ipv6(ip: Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("url")
    }

    #[tokio::test]
    async fn permissive_allows_loopback() {
        OutboundHttpSafety::permissive()
            .check_url(&url("http://127.0.0.1:1234/"))
            .await
            .expect("allowed");
    }

    #[tokio::test]
    async fn restricted_blocks_private_literals() {
        let safety = OutboundHttpSafety::restricted();
        for u in [
            "http://127.0.0.1:1234/",
            "http://10.1.2.3/",
            "http://169.254.169.254/latest/meta-data",
            "http://100.64.0.1/",
            "http://[::1]:8080/",
            "http://[::ffff:192.168.0.1]/",
        ] {
            let err = safety.check_url(&url(u)).await.unwrap_err();
            assert!(
                matches!(err, PolicyViolation::DeniedAddress { .. }),
                "{u}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn restricted_allows_public_literal() {
        OutboundHttpSafety::restricted()
            .check_url(&url("https://93.184.216.34/"))
            .await
            .expect("allowed");
    }

    #[tokio::test]
    async fn non_http_schemes_are_rejected() {
        let err = OutboundHttpSafety::permissive()
            .check_url(&url("file:///etc/passwd"))
            .await
            .unwrap_err();
        assert_eq!(err, PolicyViolation::UnsupportedScheme("file".to_string()));
    }

    #[tokio::test]
    async fn allowlist_is_case_insensitive() {
        let safety = OutboundHttpSafety::permissive().with_allowed_hosts(["Lambda-URL.Example"]);
        safety
            .check_url(&url("https://lambda-url.example/"))
            .await
            .expect("allowed");
        let err = safety
            .check_url(&url("https://other.example/"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not in allowlist"));
    }

    #[test]
    fn empty_allowlist_means_unrestricted() {
        let safety = OutboundHttpSafety::permissive().with_allowed_hosts([" ", ""]);
        assert!(safety.allowed_hosts.is_none());
    }

    #[test]
    fn redaction_drops_secrets() {
        assert_eq!(
            redact_url(&url("https://user:pw@api.example/crawl?key=secret#frag")),
            "https://api.example/crawl"
        );
        assert_eq!(redact_endpoint("not a url"), "<invalid url>");
    }
}
