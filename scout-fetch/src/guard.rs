//! URL validation and site identity helpers
//!
//! The guard rejects non-web schemes and loopback/private/link-local hosts
//! before any transport is touched.

use std::net::IpAddr;
use url::Url;

use crate::FetchError;

const BLOCKED_HOSTS: &[&str] = &["localhost", "metadata.google.internal", "169.254.169.254", "0.0.0.0"];

/// SSRF guard applied to every URL before acquisition
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlGuard {
    allow_private: bool,
}

impl UrlGuard {
    pub fn new(allow_private: bool) -> Self {
        Self { allow_private }
    }

    /// Parse and validate a URL
    pub fn check(&self, raw: &str) -> Result<Url, FetchError> {
        let parsed = Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("'{}': {}", raw, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FetchError::InvalidUrl(format!(
                    "unsupported scheme '{}' (only http/https)",
                    other
                )))
            }
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("'{}' has no host", raw)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_lowercase();

        if self.allow_private {
            return Ok(parsed);
        }

        if BLOCKED_HOSTS.contains(&host.as_str()) || host.ends_with(".localhost") || host.ends_with(".internal") {
            return Err(FetchError::Blocked(format!("host {}", host)));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            if is_private_ip(&ip) {
                return Err(FetchError::Blocked(format!("private/loopback address {}", ip)));
            }
        }

        Ok(parsed)
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified() || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link local fe80::/10
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Approximate registrable domain: last two labels, or three for
/// common two-part public suffixes like `co.uk`.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_start_matches("www.").to_lowercase();
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    let n = labels.len();
    let second = labels[n - 2];
    let take = if labels[n - 1].len() == 2 && matches!(second, "co" | "com" | "org" | "net" | "ac" | "gov" | "edu") {
        3
    } else {
        2
    };
    labels[n - take..].join(".")
}

/// Whether two URLs belong to the same registrable domain
pub fn same_site(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => registrable_domain(ha) == registrable_domain(hb),
        _ => false,
    }
}
