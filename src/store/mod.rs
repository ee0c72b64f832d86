use async_trait::async_trait;
use thiserror::Error;

use crate::model::CheckResult;

pub mod dynamo;
pub mod memory;

pub const MIN_QUERY_LIMIT: usize = 1;
pub const MAX_QUERY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
    #[error("store operation timed out after {0}ms")]
    Timeout(u64),
    #[error("malformed stored item: {0}")]
    Malformed(String),
}

/// Append log of check results, partitioned by URL and sorted by timestamp.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Writing the same `(url, timestamp)` twice leaves one item.
    async fn put(&self, result: &CheckResult) -> Result<(), StoreError>;

    /// Up to `limit` results for exactly `url`, newest first.
    async fn query(&self, url: &str, limit: usize) -> Result<Vec<CheckResult>, StoreError>;
}
