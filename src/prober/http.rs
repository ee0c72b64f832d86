use std::error::Error as StdError;
use std::net::SocketAddr;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, warn};

use super::{redirect, Probe, ProbeOutcome};
use crate::validator::ValidatedUrl;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const TIMEOUT_DETAIL: &str = "Request timeout";

pub struct HttpProber {
    client: Client,
    timeout: Duration,
    pin_resolved: bool,
    guard_redirects: bool,
}

impl HttpProber {
    pub fn new(pin_resolved: bool, guard_redirects: bool) -> Result<Self> {
        Self::with_timeout(PROBE_TIMEOUT, pin_resolved, guard_redirects)
    }

    pub fn with_timeout(timeout: Duration, pin_resolved: bool, guard_redirects: bool) -> Result<Self> {
        let client = Self::builder(timeout, guard_redirects).build()?;
        Ok(Self {
            client,
            timeout,
            pin_resolved,
            guard_redirects,
        })
    }

    fn builder(timeout: Duration, guard_redirects: bool) -> ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .redirect(redirect::policy(guard_redirects))
    }

    /// Shared client, or a one-off client whose resolver is pinned to the
    /// addresses the validator approved.
    fn client_for(&self, target: &ValidatedUrl) -> reqwest::Result<Client> {
        let host = match target.pinnable_host() {
            Some(h) if self.pin_resolved => h,
            _ => return Ok(self.client.clone()),
        };
        let port = url::Url::parse(&target.raw)
            .ok()
            .and_then(|u| u.port_or_known_default())
            .unwrap_or(80);
        let addrs: Vec<SocketAddr> = target.resolved.iter().map(|ip| SocketAddr::new(*ip, port)).collect();
        debug!("pinning {} to {:?}", host, addrs);
        Self::builder(self.timeout, self.guard_redirects)
            .resolve_to_addrs(host, &addrs)
            .build()
    }

    async fn fetch(client: &Client, url: &str) -> reqwest::Result<u16> {
        let mut resp = client.get(url).send().await?;
        let status = resp.status().as_u16();
        // drain the body so latency covers the full download, without buffering it
        while resp.chunk().await?.is_some() {}
        Ok(status)
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &ValidatedUrl) -> ProbeOutcome {
        let client = match self.client_for(target) {
            Ok(c) => c,
            Err(e) => return ProbeOutcome::failed(0.0, error_chain(&e)),
        };

        let start = Instant::now();
        let res = timeout(self.timeout, Self::fetch(&client, &target.raw)).await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match res {
            Ok(Ok(status)) => ProbeOutcome::responded(status, latency_ms),
            Ok(Err(e)) if e.is_timeout() => {
                warn!("http probe {} timed out after {:.2}ms", target.raw, latency_ms);
                ProbeOutcome::failed(latency_ms, TIMEOUT_DETAIL)
            }
            Ok(Err(e)) => {
                let detail = error_chain(&e);
                warn!("http probe {} failed: {}", target.raw, detail);
                ProbeOutcome::failed(latency_ms, detail)
            }
            Err(_) => {
                warn!("http probe {} timed out after {:.2}ms", target.raw, latency_ms);
                ProbeOutcome::failed(latency_ms, TIMEOUT_DETAIL)
            }
        }
    }
}

/// reqwest's Display stops at the outermost layer; the cause is usually further down.
fn error_chain(e: &reqwest::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
