//! WatcherBuilder - AnalysisWatcher の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 省略可能な協調オブジェクトには開発用のデフォルトを入れる

use std::sync::Arc;

use crate::app::watcher::{AnalysisWatcher, WatcherDeps};
use crate::impls::{InMemoryAnalyticsStore, LogNoticeSink};
use crate::policy::PollPolicy;
use crate::ports::{
    AnalysisJobClient, AnalyticsStore, Clock, CredentialStore, IdGenerator, NoticeSink, SystemClock,
    UlidGenerator,
};

/// WatcherBuilder は AnalysisWatcher を構築
///
/// # 使用例
/// ```ignore
/// let watcher = WatcherBuilder::new()
///     .client(Arc::new(http_client))
///     .credentials(Arc::new(InMemoryCredentials::new(Some(token))))
///     .store(Arc::new(FileAnalyticsStore::new(path)))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - client と credentials は必須
/// - ポリシーの間隔・試行回数が 0 なら BuildError
#[derive(Default)]
pub struct WatcherBuilder {
    policy: PollPolicy,
    client: Option<Arc<dyn AnalysisJobClient>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    store: Option<Arc<dyn AnalyticsStore>>,
    notices: Option<Arc<dyn NoticeSink>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}")]
    MissingComponent(&'static str),

    #[error("invalid polling policy: {0}")]
    InvalidPolicy(&'static str),
}

impl WatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(mut self, client: Arc<dyn AnalysisJobClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// 省略時は InMemoryAnalyticsStore
    pub fn store(mut self, store: Arc<dyn AnalyticsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 省略時は LogNoticeSink
    pub fn notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// 省略時は SystemClock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// 省略時は clock を使う UlidGenerator
    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 依存を検証して WatcherDeps を組み立てる（spawn はしない）
    pub fn into_parts(self) -> Result<(PollPolicy, WatcherDeps), BuildError> {
        validate_policy(&self.policy)?;
        let client = self.client.ok_or(BuildError::MissingComponent("client"))?;
        let credentials = self
            .credentials
            .ok_or(BuildError::MissingComponent("credentials"))?;
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));

        let deps = WatcherDeps {
            client,
            credentials,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryAnalyticsStore::new())),
            notices: self.notices.unwrap_or_else(|| Arc::new(LogNoticeSink)),
            clock,
            ids,
        };
        Ok((self.policy, deps))
    }

    /// 構築して driver を起動する。tokio ランタイム上で呼ぶこと
    pub fn build(self) -> Result<AnalysisWatcher, BuildError> {
        let (policy, deps) = self.into_parts()?;
        Ok(AnalysisWatcher::spawn(policy, deps))
    }
}

fn validate_policy(policy: &PollPolicy) -> Result<(), BuildError> {
    if policy.batch_interval.is_zero() {
        return Err(BuildError::InvalidPolicy("batch interval must be positive"));
    }
    if policy.cooldown.is_zero() {
        return Err(BuildError::InvalidPolicy("cooldown must be positive"));
    }
    if policy.max_batch_attempts == 0 {
        return Err(BuildError::InvalidPolicy("max batch attempts must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisRecord, ClientError, ProductId};
    use crate::impls::InMemoryCredentials;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NeverClient;

    #[async_trait]
    impl AnalysisJobClient for NeverClient {
        async fn fetch_latest_analysis(
            &self,
            _product: &ProductId,
            _credential: &str,
        ) -> Result<Option<AnalysisRecord>, ClientError> {
            Ok(None)
        }

        async fn start_regeneration(&self, _product: &ProductId, _credential: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[test]
    fn test_build_success() {
        let parts = WatcherBuilder::new()
            .client(Arc::new(NeverClient))
            .credentials(Arc::new(InMemoryCredentials::new(Some("t".into()))))
            .into_parts();
        assert!(parts.is_ok());
    }

    #[test]
    fn test_build_missing_client() {
        let parts = WatcherBuilder::new()
            .credentials(Arc::new(InMemoryCredentials::new(None)))
            .into_parts();
        assert!(matches!(parts, Err(BuildError::MissingComponent("client"))));
    }

    #[test]
    fn test_build_missing_credentials() {
        let parts = WatcherBuilder::new().client(Arc::new(NeverClient)).into_parts();
        assert!(matches!(parts, Err(BuildError::MissingComponent("credentials"))));
    }

    #[test]
    fn test_build_rejects_zero_interval() {
        let policy = PollPolicy {
            batch_interval: Duration::ZERO,
            ..PollPolicy::default()
        };
        let parts = WatcherBuilder::new()
            .policy(policy)
            .client(Arc::new(NeverClient))
            .credentials(Arc::new(InMemoryCredentials::new(None)))
            .into_parts();
        assert!(matches!(parts, Err(BuildError::InvalidPolicy(_))));
    }

    #[tokio::test]
    async fn test_build_spawns_idle_watcher() {
        let watcher = WatcherBuilder::new()
            .client(Arc::new(NeverClient))
            .credentials(Arc::new(InMemoryCredentials::new(Some("t".into()))))
            .build()
            .unwrap();
        let observed = watcher.observe();
        assert!(!observed.is_analyzing);
        assert!(!observed.data_ready);
        watcher.shutdown_and_join().await;
    }
}
