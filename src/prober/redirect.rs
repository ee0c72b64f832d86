use std::net::IpAddr;

use reqwest::redirect::{Attempt, Policy};
use url::{Host, Url};

use crate::util::is_restricted_ip;
use crate::validator::is_blocked_literal;

pub const MAX_REDIRECTS: usize = 10;

/// Redirect policy for probes. With `guard` on, every hop is held to the same
/// literal rules as the original URL. Hop names are not resolved here since
/// the policy callback is synchronous.
pub fn policy(guard: bool) -> Policy {
    Policy::custom(move |attempt: Attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if guard {
            if let Err(reason) = check_hop(attempt.url()) {
                let msg = format!("redirect to {} refused: {}", attempt.url(), reason);
                return attempt.error(msg);
            }
        }
        attempt.follow()
    })
}

pub fn check_hop(url: &Url) -> Result<(), &'static str> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err("scheme not allowed");
    }
    let ip = match url.host() {
        Some(Host::Domain(d)) => {
            if is_blocked_literal(d) {
                return Err("localhost");
            }
            return Ok(());
        }
        Some(Host::Ipv4(v4)) => IpAddr::V4(v4),
        Some(Host::Ipv6(v6)) => IpAddr::V6(v6),
        None => return Err("no host"),
    };
    if is_blocked_literal(&ip.to_string()) {
        return Err("localhost");
    }
    if is_restricted_ip(&ip) {
        return Err("private address");
    }
    Ok(())
}
