use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::{HistoryStore, StoreError};
use crate::model::CheckResult;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB table with partition key `url` (S) and sort key `timestamp` (S).
pub struct DynamoStore {
    client: Client,
    table: String,
    timeout: Duration,
}

impl DynamoStore {
    pub async fn connect(table: &str, timeout: Duration) -> Self {
        let region_provider = RegionProviderChain::default_provider().or_else("us-east-1");
        let aws_cfg = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;
        tracing::info!("Using DynamoDB table {} (region {:?})", table, aws_cfg.region());
        Self::new(Client::new(&aws_cfg), table, timeout)
    }

    pub fn new(client: Client, table: &str, timeout: Duration) -> Self {
        Self {
            client,
            table: table.to_string(),
            timeout,
        }
    }

    /// The SDK has no per-call deadline of its own here, so every call gets one.
    async fn bounded<T, E, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        E: StdError,
    {
        match timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| StoreError::Backend(DisplayErrorContext(e).to_string())),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl HistoryStore for DynamoStore {
    async fn put(&self, result: &CheckResult) -> Result<(), StoreError> {
        let req = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(result)));
        self.bounded(req.send()).await?;
        debug!("stored check {} @ {}", result.url, result.timestamp);
        Ok(())
    }

    async fn query(&self, url: &str, limit: usize) -> Result<Vec<CheckResult>, StoreError> {
        let req = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression("#url = :url")
            .expression_attribute_names("#url", "url")
            .expression_attribute_values(":url", AttributeValue::S(url.to_string()))
            .scan_index_forward(false)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX));
        let out = self.bounded(req.send()).await?;
        out.items().iter().map(from_item).collect()
    }
}

pub fn to_item(result: &CheckResult) -> Item {
    let mut item = HashMap::from([
        ("url".to_string(), AttributeValue::S(result.url.clone())),
        ("timestamp".to_string(), AttributeValue::S(result.timestamp.clone())),
        ("status_code".to_string(), AttributeValue::N(result.status_code.to_string())),
        ("latency_ms".to_string(), AttributeValue::N(result.latency_ms.to_string())),
        ("success".to_string(), AttributeValue::Bool(result.success)),
    ]);
    if let Some(err) = &result.error {
        item.insert("error".to_string(), AttributeValue::S(err.clone()));
    }
    item
}

pub fn from_item(item: &Item) -> Result<CheckResult, StoreError> {
    Ok(CheckResult {
        url: string_attr(item, "url")?,
        timestamp: string_attr(item, "timestamp")?,
        status_code: number_attr(item, "status_code")?,
        latency_ms: number_attr(item, "latency_ms")?,
        success: item
            .get("success")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .ok_or_else(|| StoreError::Malformed("success".into()))?,
        error: item.get("error").and_then(|v| v.as_s().ok()).cloned(),
    })
}

fn string_attr(item: &Item, name: &str) -> Result<String, StoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| StoreError::Malformed(name.to_string()))
}

fn number_attr<T: std::str::FromStr>(item: &Item, name: &str) -> Result<T, StoreError> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| StoreError::Malformed(name.to_string()))
}
