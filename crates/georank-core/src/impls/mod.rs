//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpAnalysisClient**: reqwest による分析 API クライアント（本番用）
//! - **FileAnalyticsStore**: JSON ファイルのキャッシュ（本番用）
//! - **InMemoryAnalyticsStore** / **InMemoryCredentials**: 開発・テスト用
//! - **LogNoticeSink**: 通知を tracing に流す

pub mod file_store;
pub mod http_client;
pub mod log_notices;
pub mod memory_credentials;
pub mod memory_store;

pub use self::file_store::FileAnalyticsStore;
pub use self::http_client::HttpAnalysisClient;
pub use self::log_notices::{LogNoticeSink, RecordingNoticeSink};
pub use self::memory_credentials::InMemoryCredentials;
pub use self::memory_store::InMemoryAnalyticsStore;
