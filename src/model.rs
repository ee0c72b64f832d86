use serde::{Deserialize, Serialize};

use crate::prober::ProbeOutcome;

/// One stored check. Keyed by `(url, timestamp)`, never updated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub url: String,
    pub timestamp: String,
    pub status_code: u16,
    pub latency_ms: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn from_outcome(url: &str, timestamp: String, outcome: ProbeOutcome) -> Self {
        // A reachable target never carries an error, even if the prober filled one in.
        let error = if outcome.success { None } else { outcome.error_detail };
        Self {
            url: url.to_string(),
            timestamp,
            status_code: outcome.status_code,
            latency_ms: round_latency(outcome.latency_ms),
            success: outcome.success,
            error,
        }
    }
}

pub fn round_latency(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reached_but_failed_has_no_error_field() {
        let outcome = ProbeOutcome { status_code: 404, latency_ms: 12.3456, success: false, error_detail: None };
        let r = CheckResult::from_outcome("https://example.com/missing", "2024-01-01T00:00:00.000000Z".into(), outcome);
        assert_eq!(r.latency_ms, 12.35);
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            json!({
                "url": "https://example.com/missing",
                "timestamp": "2024-01-01T00:00:00.000000Z",
                "status_code": 404,
                "latency_ms": 12.35,
                "success": false
            })
        );
    }

    #[test]
    fn test_unreached_carries_error() {
        let outcome = ProbeOutcome::failed(10000.4, "Request timeout");
        let r = CheckResult::from_outcome("https://slow.example", "2024-01-01T00:00:00.000000Z".into(), outcome);
        assert_eq!(r.status_code, 0);
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("Request timeout"));
        assert_eq!(serde_json::to_value(&r).unwrap()["error"], "Request timeout");
    }

    #[test]
    fn test_success_drops_stray_error() {
        let outcome = ProbeOutcome { status_code: 200, latency_ms: 1.0, success: true, error_detail: Some("x".into()) };
        let r = CheckResult::from_outcome("https://example.com", "t".into(), outcome);
        assert_eq!(r.error, None);
    }
}
