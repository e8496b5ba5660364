//! InMemoryAnalyticsStore - 開発・テスト用のキャッシュ

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{AnalysisRecord, ProductId, StoreError};
use crate::ports::AnalyticsStore;

#[derive(Debug, Default)]
pub struct InMemoryAnalyticsStore {
    records: Mutex<HashMap<ProductId, AnalysisRecord>>,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn load(&self, product: &ProductId) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self.records.lock().await.get(product).cloned())
    }

    async fn save(&self, product: &ProductId, record: &AnalysisRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .await
            .insert(product.clone(), record.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.records.lock().await.clear();
        Ok(())
    }
}
