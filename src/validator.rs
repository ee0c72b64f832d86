// URL safety gate in front of every outbound request. First failing check wins.

use std::net::IpAddr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

use crate::util::{is_restricted_ip, HostResolver};

const BLOCKED_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("URL is required")]
    Missing,
    #[error("URL must be a string")]
    NotAString,
    #[error("Invalid URL format")]
    InvalidFormat,
    #[error("Invalid URL: {0}")]
    Unparseable(String),
    #[error("URL must use http or https protocol")]
    UnsupportedScheme,
    #[error("Invalid hostname")]
    InvalidHostname,
    #[error("Access to localhost is not allowed")]
    Localhost,
    #[error("Access to private/internal IP addresses is not allowed")]
    PrivateAddress,
}

/// A URL that passed every check, with the addresses approved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUrl {
    /// Exactly what the caller sent.
    pub raw: String,
    pub host: String,
    /// Empty when the host is an IP literal or did not resolve.
    pub resolved: Vec<IpAddr>,
}

impl ValidatedUrl {
    /// Host name to pin to `resolved`, if there is one.
    pub fn pinnable_host(&self) -> Option<&str> {
        if self.resolved.is_empty() || self.host.parse::<IpAddr>().is_ok() {
            None
        } else {
            Some(&self.host)
        }
    }
}

pub struct UrlValidator {
    resolver: Arc<dyn HostResolver>,
}

impl UrlValidator {
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }

    /// Validates a URL taken straight out of a request payload.
    pub async fn validate(&self, raw: Option<&Value>) -> Result<ValidatedUrl, Rejection> {
        let url = match raw {
            None => return Err(Rejection::Missing),
            Some(v) if is_falsy(v) => return Err(Rejection::Missing),
            Some(Value::String(s)) => s.as_str(),
            Some(_) => return Err(Rejection::NotAString),
        };
        self.validate_str(url).await
    }

    pub async fn validate_str(&self, raw: &str) -> Result<ValidatedUrl, Rejection> {
        if raw.is_empty() {
            return Err(Rejection::Missing);
        }

        // The url crate repairs `http:host` and `http:///host`; those have no authority.
        match authority_of(raw) {
            Some(a) if !a.is_empty() => {}
            _ => return Err(Rejection::InvalidFormat),
        }

        let parsed = match Url::parse(raw) {
            Ok(u) => u,
            Err(url::ParseError::RelativeUrlWithoutBase) => return Err(Rejection::InvalidFormat),
            // authority present but only userinfo or port in it
            Err(url::ParseError::EmptyHost) => return Err(Rejection::InvalidHostname),
            Err(e) => return Err(Rejection::Unparseable(e.to_string())),
        };
        if !parsed.has_host() {
            return Err(Rejection::InvalidFormat);
        }

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Rejection::UnsupportedScheme);
        }

        let (host, literal) = match parsed.host() {
            Some(Host::Domain(d)) if !d.is_empty() => (d.to_string(), None),
            Some(Host::Ipv4(v4)) => (v4.to_string(), Some(IpAddr::V4(v4))),
            Some(Host::Ipv6(v6)) => (v6.to_string(), Some(IpAddr::V6(v6))),
            _ => return Err(Rejection::InvalidHostname),
        };

        if is_blocked_literal(&host) {
            return Err(Rejection::Localhost);
        }

        let resolved = match literal {
            Some(ip) => {
                if is_restricted_ip(&ip) {
                    return Err(Rejection::PrivateAddress);
                }
                Vec::new()
            }
            None => match self.resolver.resolve(&host).await {
                Ok(ips) => {
                    if ips.iter().any(is_restricted_ip) {
                        return Err(Rejection::PrivateAddress);
                    }
                    ips
                }
                Err(e) => {
                    debug!("deferring unresolvable host {}: {}", host, e);
                    Vec::new()
                }
            },
        };

        Ok(ValidatedUrl {
            raw: raw.to_string(),
            host,
            resolved,
        })
    }
}

/// Text between `scheme://` and the path, or `None` if there is no `//`.
fn authority_of(raw: &str) -> Option<&str> {
    let (scheme, rest) = raw.trim_start().split_once(':')?;
    if scheme.is_empty() {
        return None;
    }
    let rest = rest.strip_prefix("//")?;
    let end = rest.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Case-insensitive match against the names rejected without resolution.
pub fn is_blocked_literal(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    BLOCKED_HOSTS.iter().any(|b| host.eq_ignore_ascii_case(b))
}

fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
