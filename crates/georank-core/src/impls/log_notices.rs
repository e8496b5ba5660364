//! LogNoticeSink - 通知を tracing に流す NoticeSink
//!
//! CLI には UI がないので、トーストの代わりにログへ出します。

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::domain::Notice;
use crate::ports::NoticeSink;

#[derive(Debug, Default)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::AnalysisCompleted {
                product,
                analysis_id,
            } => info!(%product, analysis = %analysis_id, "analysis completed"),
            Notice::AnalysisFailed {
                product,
                analysis_id,
            } => warn!(%product, analysis = %analysis_id, "analysis failed"),
            Notice::TakingLonger { product, retry_in } => info!(
                %product,
                retry_in_secs = retry_in.as_secs(),
                "analysis is taking longer than expected"
            ),
            Notice::CooldownResumed { product } => debug!(%product, "polling resumed"),
        }
    }
}

/// テスト用: 受け取った通知を記録する
#[derive(Debug, Default)]
pub struct RecordingNoticeSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNoticeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl NoticeSink for RecordingNoticeSink {
    fn notify(&self, notice: Notice) {
        if let Ok(mut n) = self.notices.lock() {
            n.push(notice);
        }
    }
}
