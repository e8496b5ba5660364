//! NoticeSink port - ユーザー通知（トースト）の出口

use crate::domain::Notice;

/// NoticeSink は一回限りの通知を UI に届ける
///
/// 重複排除は状態機械側で済んでいる前提です。
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}
