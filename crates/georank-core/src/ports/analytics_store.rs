//! AnalyticsStore port - 直近の完了済み分析の永続キャッシュ
//!
//! # ライフサイクル
//! - 採用（adopt）時に書き込み（解決ごとに一度）
//! - セッション開始時に読み込み（previousAnalytics の初期値）
//! - ログアウト時に全消去

use async_trait::async_trait;

use crate::domain::{AnalysisRecord, ProductId, StoreError};

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn load(&self, product: &ProductId) -> Result<Option<AnalysisRecord>, StoreError>;

    async fn save(&self, product: &ProductId, record: &AnalysisRecord) -> Result<(), StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
