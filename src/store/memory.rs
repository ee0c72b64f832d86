use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{HistoryStore, StoreError};
use crate::model::CheckResult;

/// Process-local backend for development and tests. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, BTreeMap<String, CheckResult>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn put(&self, result: &CheckResult) -> Result<(), StoreError> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(result.url.clone())
            .or_default()
            .insert(result.timestamp.clone(), result.clone());
        Ok(())
    }

    async fn query(&self, url: &str, limit: usize) -> Result<Vec<CheckResult>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(url)
            .map(|items| items.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
