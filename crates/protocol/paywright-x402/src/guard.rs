//! Outbound URL safety checks.
//!
//! Facilitator and payment URLs come from untrusted pages. Before any request
//! is made the URL must be HTTPS and its host must not resolve into a
//! loopback, private, or link-local range, otherwise a malicious page could
//! aim the client at an internal service.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use tokio::net::lookup_host;
use url::Url;

use crate::error::{X402Error, X402Result};

/// Validate a facilitator or payment URL before use.
pub async fn validate_outbound_url(raw: &str) -> X402Result<Url> {
    let unsafe_url = |reason: &str| X402Error::UnsafeUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|_| unsafe_url("not a valid URL"))?;
    if url.scheme() != "https" {
        return Err(unsafe_url("scheme must be https"));
    }
    let host = url.host_str().ok_or_else(|| unsafe_url("missing host"))?;

    // IP literals are checked directly; hostnames are resolved and every
    // address must pass, so a split-horizon DNS answer cannot slip through.
    if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
        if is_forbidden(ip) {
            return Err(unsafe_url("resolves to a private or loopback address"));
        }
        return Ok(url);
    }

    let port = url.port().unwrap_or(443);
    let addrs = lookup_host((host, port))
        .await
        .map_err(|e| unsafe_url(&format!("DNS resolution failed: {e}")))?;
    let mut any = false;
    for addr in addrs {
        any = true;
        if is_forbidden(addr.ip()) {
            return Err(unsafe_url("resolves to a private or loopback address"));
        }
    }
    if !any {
        return Err(unsafe_url("host resolved to no addresses"));
    }
    Ok(url)
}

fn is_forbidden(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_v4(v4),
        IpAddr::V6(v6) => is_forbidden_v6(v6),
    }
}

fn is_forbidden_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_forbidden_v6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_forbidden_v4(v4);
    }
    ip.is_loopback()
        || ip.is_unspecified()
        // fe80::/10 link-local
        || (ip.segments()[0] & 0xffc0) == 0xfe80
        // fc00::/7 unique-local
        || (ip.segments()[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_plain_http() {
        let err = validate_outbound_url("http://facilitator.example/v2")
            .await
            .unwrap_err();
        assert!(matches!(err, X402Error::UnsafeUrl { .. }));
    }

    #[tokio::test]
    async fn test_rejects_loopback_and_private_literals() {
        for url in [
            "https://127.0.0.1/v2",
            "https://10.0.0.5/v2",
            "https://172.16.1.1/v2",
            "https://192.168.1.10/v2",
            "https://169.254.0.1/v2",
            "https://[::1]/v2",
            "https://[::ffff:192.168.1.1]/v2",
            "https://[fe80::1]/v2",
            "https://[fd00::1]/v2",
        ] {
            let err = validate_outbound_url(url).await.unwrap_err();
            assert!(matches!(err, X402Error::UnsafeUrl { .. }), "{url}");
        }
    }

    #[tokio::test]
    async fn test_accepts_public_literal() {
        assert!(validate_outbound_url("https://1.1.1.1/v2").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        assert!(validate_outbound_url("not a url").await.is_err());
        assert!(validate_outbound_url("https://").await.is_err());
    }

    #[test]
    fn test_forbidden_v6_ranges() {
        assert!(is_forbidden("::1".parse().unwrap()));
        assert!(is_forbidden("fe80::dead".parse().unwrap()));
        assert!(is_forbidden("fc00::1".parse().unwrap()));
        assert!(is_forbidden("::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_forbidden("2606:4700::1111".parse().unwrap()));
    }
}
