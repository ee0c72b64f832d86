// CheckWebsite and GetHistory, independent of any HTTP framework.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::metrics;
use crate::model::CheckResult;
use crate::prober::Probe;
use crate::store::{HistoryStore, StoreError, MAX_QUERY_LIMIT, MIN_QUERY_LIMIT};
use crate::timestamp::utc_timestamp;
use crate::validator::{Rejection, UrlValidator};

pub const DEFAULT_HISTORY_LIMIT: &str = "10";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid JSON in request body")]
    MalformedJson,
    #[error("Request body must be a JSON object")]
    BodyNotObject,
    #[error(transparent)]
    UnsafeUrl(#[from] Rejection),
    #[error("URL parameter is required")]
    MissingUrlParam,
    #[error("Invalid limit parameter: {0}")]
    InvalidLimit(String),
    #[error("Failed to store check result")]
    StoreWrite(#[source] StoreError),
    #[error("Failed to query check history")]
    StoreRead(#[source] StoreError),
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::StoreWrite(_) | ApiError::StoreRead(_) | ApiError::Internal(_) => 500,
            _ => 400,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::StoreWrite(e) | ApiError::StoreRead(e) => {
                json!({ "error": self.to_string(), "details": e.to_string() })
            }
            ApiError::Internal(details) => json!({ "error": self.to_string(), "details": details }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResponse {
    pub message: String,
    pub result: CheckResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryResponse {
    pub url: String,
    pub count: usize,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status_code: u16, body: Value) -> Self {
        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ]);
        Self { status_code, headers, body }
    }

    pub fn from_result<T: Serialize>(res: Result<T, ApiError>) -> Self {
        let res = res.and_then(|ok| serde_json::to_value(ok).map_err(|e| ApiError::Internal(e.to_string())));
        match res {
            Ok(body) => Self::new(200, body),
            Err(e) => {
                if let ApiError::Internal(details) = &e {
                    error!("Unexpected error: {}", details);
                }
                Self::new(e.status_code(), e.body())
            }
        }
    }
}

/// Wiring for both operations. Built once at startup and shared.
pub struct CheckService {
    validator: UrlValidator,
    prober: Arc<dyn Probe>,
    store: Arc<dyn HistoryStore>,
}

impl CheckService {
    pub fn new(validator: UrlValidator, prober: Arc<dyn Probe>, store: Arc<dyn HistoryStore>) -> Self {
        Self { validator, prober, store }
    }

    /// Accepts the payload itself or an event wrapping it in `body`, where
    /// `body` is either an object or JSON text.
    pub async fn check_website(&self, event: &Value) -> Result<CheckResponse, ApiError> {
        let payload = extract_payload(event)?;
        let raw = payload.as_object().ok_or(ApiError::BodyNotObject)?.get("url");

        let target = match self.validator.validate(raw).await {
            Ok(t) => t,
            Err(reason) => {
                info!("rejected check request: {}", reason);
                metrics::inc_check("rejected");
                return Err(reason.into());
            }
        };

        let outcome = self.prober.probe(&target).await;
        let result = CheckResult::from_outcome(&target.raw, utc_timestamp(), outcome);

        if let Err(e) = self.store.put(&result).await {
            error!(
                url = %result.url,
                status_code = result.status_code,
                latency_ms = result.latency_ms,
                success = result.success,
                "Failed to store check result: {}",
                e
            );
            metrics::inc_check("store_error");
            return Err(ApiError::StoreWrite(e));
        }

        let outcome_label = if result.success { "reachable" } else { "unreachable" };
        metrics::inc_check(outcome_label);
        metrics::observe_latency(outcome_label, result.latency_ms);
        if !result.success {
            warn!("{} unreachable: status {} {:?}", result.url, result.status_code, result.error);
        }

        Ok(CheckResponse {
            message: "Website status checked successfully".to_string(),
            result,
        })
    }

    pub async fn get_history(&self, params: &HashMap<String, String>) -> Result<HistoryResponse, ApiError> {
        let url = match params.get("url") {
            Some(u) if !u.is_empty() => u.clone(),
            _ => return Err(ApiError::MissingUrlParam),
        };
        let limit = parse_limit(params.get("limit").map(String::as_str).unwrap_or(DEFAULT_HISTORY_LIMIT))?;

        let checks = self.store.query(&url, limit).await.map_err(|e| {
            error!("Failed to query check history for {}: {}", url, e);
            ApiError::StoreRead(e)
        })?;

        Ok(HistoryResponse {
            url,
            count: checks.len(),
            checks,
        })
    }
}

fn extract_payload(event: &Value) -> Result<Value, ApiError> {
    match event.get("body") {
        Some(Value::String(text)) => serde_json::from_str(text).map_err(|_| ApiError::MalformedJson),
        Some(body) => Ok(body.clone()),
        None => Ok(event.clone()),
    }
}

pub fn parse_limit(raw: &str) -> Result<usize, ApiError> {
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ApiError::InvalidLimit(e.to_string()))?;
    if limit < MIN_QUERY_LIMIT as i64 || limit > MAX_QUERY_LIMIT as i64 {
        return Err(ApiError::InvalidLimit(format!(
            "Limit must be between {} and {}",
            MIN_QUERY_LIMIT, MAX_QUERY_LIMIT
        )));
    }
    Ok(limit as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::prober::ProbeOutcome;
    use crate::store::memory::MemoryStore;
    use crate::validator::tests::StaticResolver;
    use crate::validator::ValidatedUrl;

    struct StubProber {
        outcome: ProbeOutcome,
        calls: AtomicUsize,
    }

    impl StubProber {
        fn new(outcome: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self { outcome, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl Probe for StubProber {
        async fn probe(&self, _target: &ValidatedUrl) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    struct FailingStore;

    #[async_trait]
    impl HistoryStore for FailingStore {
        async fn put(&self, _result: &CheckResult) -> Result<(), StoreError> {
            Err(StoreError::Backend("ResourceNotFoundException: table missing".into()))
        }

        async fn query(&self, _url: &str, _limit: usize) -> Result<Vec<CheckResult>, StoreError> {
            Err(StoreError::Timeout(5000))
        }
    }

    fn resolver() -> Arc<StaticResolver> {
        Arc::new(StaticResolver::with(&[
            ("example.com", "93.184.216.34"),
            ("intranet.corp.test", "10.20.30.40"),
        ]))
    }

    fn service(prober: Arc<StubProber>, store: Arc<dyn HistoryStore>) -> CheckService {
        CheckService::new(UrlValidator::new(resolver()), prober, store)
    }

    fn reachable() -> Arc<StubProber> {
        StubProber::new(ProbeOutcome::responded(200, 42.123))
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_localhost_rejected_before_probe() {
        let prober = reachable();
        let svc = service(prober.clone(), Arc::new(MemoryStore::new()));
        let resp = ApiResponse::from_result(svc.check_website(&json!({"url": "http://localhost"})).await);
        assert_eq!(resp.status_code, 400);
        assert!(resp.body["error"].as_str().unwrap().contains("localhost"));
        assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_private_name_rejected() {
        let svc = service(reachable(), Arc::new(MemoryStore::new()));
        let err = svc.check_website(&json!({"url": "http://intranet.corp.test/"})).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.body(), json!({"error": "Access to private/internal IP addresses is not allowed"}));
    }

    #[tokio::test]
    async fn test_reachable_check_is_stored_and_echoed() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(reachable(), store.clone());
        let resp = ApiResponse::from_result(svc.check_website(&json!({"url": "https://example.com"})).await);

        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.headers["Content-Type"], "application/json");
        assert_eq!(resp.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(resp.body["message"], "Website status checked successfully");
        let result = &resp.body["result"];
        assert_eq!(result["success"], true);
        assert_eq!(result["status_code"], 200);
        assert_eq!(result["latency_ms"], 42.12);
        assert!(result.get("error").is_none());

        let stored = store.query("https://example.com", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(serde_json::to_value(&stored[0]).unwrap(), *result);
    }

    #[tokio::test]
    async fn test_unreachable_target_is_still_200() {
        let prober = StubProber::new(ProbeOutcome::failed(10000.0, "Request timeout"));
        let svc = service(prober, Arc::new(MemoryStore::new()));
        let ok = svc.check_website(&json!({"url": "https://does-not-resolve.invalid"})).await.unwrap();
        assert!(!ok.result.success);
        assert_eq!(ok.result.status_code, 0);
        assert_eq!(ok.result.error.as_deref(), Some("Request timeout"));
    }

    #[tokio::test]
    async fn test_event_body_forms() {
        let svc = service(reachable(), Arc::new(MemoryStore::new()));
        let text = json!({"body": "{\"url\": \"https://example.com\"}"});
        assert!(svc.check_website(&text).await.is_ok());
        let object = json!({"body": {"url": "https://example.com"}});
        assert!(svc.check_website(&object).await.is_ok());

        let bad = svc.check_website(&json!({"body": "{not json"})).await.unwrap_err();
        assert_eq!(bad.status_code(), 400);
        assert_eq!(bad.body(), json!({"error": "Invalid JSON in request body"}));

        let array = svc.check_website(&json!({"body": "[1, 2]"})).await.unwrap_err();
        assert!(matches!(array, ApiError::BodyNotObject));

        let missing = svc.check_website(&json!({"body": "{}"})).await.unwrap_err();
        assert_eq!(missing.body(), json!({"error": "URL is required"}));
    }

    #[tokio::test]
    async fn test_store_failure_is_500_with_details() {
        let svc = service(reachable(), Arc::new(FailingStore));
        let resp = ApiResponse::from_result(svc.check_website(&json!({"url": "https://example.com"})).await);
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.body["error"], "Failed to store check result");
        assert!(resp.body["details"].as_str().unwrap().contains("ResourceNotFoundException"));

        let resp = ApiResponse::from_result(svc.get_history(&params(&[("url", "https://example.com")])).await);
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.body["error"], "Failed to query check history");
    }

    #[tokio::test]
    async fn test_history_parameter_validation() {
        let svc = service(reachable(), Arc::new(MemoryStore::new()));

        let err = svc.get_history(&params(&[])).await.unwrap_err();
        assert_eq!(err.body(), json!({"error": "URL parameter is required"}));
        let err = svc.get_history(&params(&[("url", "")])).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingUrlParam));

        for bad in ["0", "101", "-3", "ten", "", "2.5"] {
            let err = svc
                .get_history(&params(&[("url", "https://example.com"), ("limit", bad)]))
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 400, "limit={bad}");
            assert!(err.to_string().starts_with("Invalid limit parameter: "), "limit={bad}");
        }

        let ok = svc.get_history(&params(&[("url", "https://example.com"), ("limit", "100")])).await.unwrap();
        assert_eq!(ok.count, 0);
        assert!(ok.checks.is_empty());
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(reachable(), store.clone());
        for i in 1..=3 {
            let r = CheckResult {
                url: "https://example.com".into(),
                timestamp: format!("2024-06-0{i}T12:00:00.000000Z"),
                status_code: 200,
                latency_ms: i as f64,
                success: true,
                error: None,
            };
            store.put(&r).await.unwrap();
        }
        let resp = ApiResponse::from_result(svc.get_history(&params(&[("url", "https://example.com"), ("limit", "10")])).await);
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body["url"], "https://example.com");
        assert_eq!(resp.body["count"], 3);
        let stamps: Vec<&str> = resp.body["checks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["timestamp"].as_str().unwrap())
            .collect();
        assert_eq!(
            stamps,
            ["2024-06-03T12:00:00.000000Z", "2024-06-02T12:00:00.000000Z", "2024-06-01T12:00:00.000000Z"]
        );
    }

    #[tokio::test]
    async fn test_round_trip_through_history() {
        let prober = StubProber::new(ProbeOutcome::responded(404, 7.777));
        let svc = service(prober, Arc::new(MemoryStore::new()));
        let checked = svc.check_website(&json!({"url": "https://example.com/Some/Path?q=1"})).await.unwrap();
        let history = svc
            .get_history(&params(&[("url", "https://example.com/Some/Path?q=1"), ("limit", "1")]))
            .await
            .unwrap();
        assert_eq!(history.checks, vec![checked.result]);
    }

    #[test]
    fn test_parse_limit_default_and_bounds() {
        assert_eq!(parse_limit(DEFAULT_HISTORY_LIMIT).unwrap(), 10);
        assert_eq!(parse_limit("1").unwrap(), 1);
        assert_eq!(parse_limit(" 100 ").unwrap(), 100);
        assert!(parse_limit("0").is_err());
    }
}
