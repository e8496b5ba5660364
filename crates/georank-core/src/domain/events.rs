//! Events - ユーザー向け通知
//!
//! いずれも情報通知であり、エラーではありません。

use std::time::Duration;

use serde::Serialize;

use super::product::ProductId;

/// Notice は UI（トーストなど）に出す一回限りの通知
///
/// # 重複排除
/// - AnalysisCompleted / AnalysisFailed: 完了シグネチャごとに一度
/// - TakingLonger: セッションごとに一度（最初のクールダウン突入時）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    AnalysisCompleted {
        product: ProductId,
        analysis_id: String,
    },
    AnalysisFailed {
        product: ProductId,
        analysis_id: String,
    },
    TakingLonger {
        product: ProductId,
        #[serde(with = "duration_secs")]
        retry_in: Duration,
    },
    CooldownResumed {
        product: ProductId,
    },
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
