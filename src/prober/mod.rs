use async_trait::async_trait;

use crate::validator::ValidatedUrl;

pub mod http;
pub mod redirect;

/// What a single probe attempt produced. Transport failures live in here too.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Final status after redirects, `0` when no response arrived.
    pub status_code: u16,
    pub latency_ms: f64,
    pub success: bool,
    /// Set only when no response arrived.
    pub error_detail: Option<String>,
}

impl ProbeOutcome {
    pub fn responded(status_code: u16, latency_ms: f64) -> Self {
        Self {
            status_code,
            latency_ms,
            success: (200..400).contains(&status_code),
            error_detail: None,
        }
    }

    pub fn failed(latency_ms: f64, detail: impl Into<String>) -> Self {
        Self {
            status_code: 0,
            latency_ms,
            success: false,
            error_detail: Some(detail.into()),
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Never fails; every transport error becomes part of the outcome.
    async fn probe(&self, target: &ValidatedUrl) -> ProbeOutcome;
}
