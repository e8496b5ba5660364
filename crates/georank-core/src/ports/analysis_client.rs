//! AnalysisJobClient port - 分析 API（ブラックボックス）
//!
//! ポーリング中の状態機械から見える外部サービスはこれだけです。

use async_trait::async_trait;

use crate::domain::{AnalysisRecord, ClientError, ProductId};

/// AnalysisJobClient はバックエンドの分析ジョブ API
///
/// # 契約
/// - `fetch_latest_analysis`: 最新の 1 件。`Ok(None)` は「まだ分析がない」
/// - `start_regeneration`: 受理されたことだけを意味する（完了ではない）
/// - 401/403 は `ClientError::Unauthorized`
#[async_trait]
pub trait AnalysisJobClient: Send + Sync {
    async fn fetch_latest_analysis(
        &self,
        product: &ProductId,
        credential: &str,
    ) -> Result<Option<AnalysisRecord>, ClientError>;

    async fn start_regeneration(&self, product: &ProductId, credential: &str) -> Result<(), ClientError>;
}
