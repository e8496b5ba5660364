//! FileAnalyticsStore - JSON ファイルに保存するキャッシュ
//!
//! ブラウザの localStorage に相当します。product id → 最後の完了済み分析。
//! 書き込みは一時ファイル + rename で原子的に行います。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{AnalysisRecord, ProductId, StoreError};
use crate::ports::AnalyticsStore;

type Document = BTreeMap<ProductId, AnalysisRecord>;

pub struct FileAnalyticsStore {
    path: PathBuf,
    // 同一プロセス内の read-modify-write を直列化
    write_lock: Mutex<()>,
}

impl FileAnalyticsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Document, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Document::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for FileAnalyticsStore {
    async fn load(&self, product: &ProductId) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self.read_document().await?.remove(product))
    }

    async fn save(&self, product: &ProductId, record: &AnalysisRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.insert(product.clone(), record.clone());
        self.write_document(&doc).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisStatus, EpochMs};
    use serde_json::json;

    fn record(product: &str, id: &str) -> AnalysisRecord {
        AnalysisRecord {
            id: id.into(),
            product_id: ProductId::new(product),
            status: AnalysisStatus::Completed,
            timestamp: Some(EpochMs::new(1_714_557_600_000)),
            payload: json!({ "geo_score": 42 }),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnalyticsStore::new(dir.path().join("cache.json"));
        assert_eq!(store.load(&ProductId::new("p1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_per_product() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnalyticsStore::new(dir.path().join("nested").join("cache.json"));
        store.save(&ProductId::new("p1"), &record("p1", "a")).await.unwrap();
        store.save(&ProductId::new("p2"), &record("p2", "b")).await.unwrap();
        store.save(&ProductId::new("p1"), &record("p1", "c")).await.unwrap();

        let reopened = FileAnalyticsStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load(&ProductId::new("p1")).await.unwrap().unwrap().id, "c");
        assert_eq!(reopened.load(&ProductId::new("p2")).await.unwrap().unwrap().id, "b");
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAnalyticsStore::new(dir.path().join("cache.json"));
        store.save(&ProductId::new("p1"), &record("p1", "a")).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load(&ProductId::new("p1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = FileAnalyticsStore::new(path);
        assert!(matches!(
            store.load(&ProductId::new("p1")).await,
            Err(StoreError::Serde(_))
        ));
    }
}
