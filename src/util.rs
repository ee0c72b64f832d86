// Host resolution and address classification helpers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use anyhow::Result;
use async_trait::async_trait;

/// Resolves a host name to every address the system resolver returns for it.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>>;
}

/// getaddrinfo-backed resolver, the same path reqwest uses when it connects.
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        resolve_host_to_ips(host).await
    }
}

pub async fn resolve_host_to_ips(host: &str) -> Result<Vec<IpAddr>> {
    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let addr = format!("{}:0", host);
    let mut ips: Vec<IpAddr> = tokio::net::lookup_host(&addr).await?.map(|a| a.ip()).collect();
    ips.dedup();
    if ips.is_empty() {
        return Err(anyhow::anyhow!("Could not resolve hostname: {}", host));
    }
    Ok(ips)
}

/// True for anything that is not a publicly routable unicast address.
pub fn is_restricted_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_restricted_v4(v4),
        IpAddr::V6(v6) => is_restricted_v6(v6),
    }
}

fn is_restricted_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        // 0.0.0.0/8 "this network"
        || a == 0
        // 100.64.0.0/10 shared address space
        || (a == 100 && (b & 0xc0) == 64)
        // 192.0.0.0/24 protocol assignments
        || (a == 192 && b == 0 && c == 0)
        // 198.18.0.0/15 benchmarking
        || (a == 198 && (b & 0xfe) == 18)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_restricted_v6(ip: &Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_restricted_v4(&mapped);
    }
    let seg = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 unique local
        || (seg[0] & 0xfe00) == 0xfc00
        // fe80::/10 link-local
        || (seg[0] & 0xffc0) == 0xfe80
        // fec0::/10 deprecated site-local
        || (seg[0] & 0xffc0) == 0xfec0
        // 2001:db8::/32 documentation
        || (seg[0] == 0x2001 && seg[1] == 0x0db8)
        // 2001::/23 IETF protocol assignments
        || (seg[0] == 0x2001 && seg[1] < 0x0200)
        // 100::/64 discard-only
        || (seg[0] == 0x0100 && seg[1] == 0 && seg[2] == 0 && seg[3] == 0)
        // ::/96 IPv4-compatible (deprecated)
        || (seg[..6].iter().all(|s| *s == 0))
}
