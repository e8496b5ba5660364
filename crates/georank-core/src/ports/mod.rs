//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 状態機械は純粋で、外部とのやり取りはすべてここの trait を通します。
//!
//! # 設計原則
//! - 分析 API はブラックボックス（AnalysisJobClient）
//! - トークンと認証失敗の扱いは CredentialStore に委譲
//! - 完了済み分析のキャッシュは注入されるストア（グローバル変数にしない）

pub mod analysis_client;
pub mod analytics_store;
pub mod clock;
pub mod credentials;
pub mod id_generator;
pub mod notices;

// 主要な trait を再エクスポート
pub use self::analysis_client::AnalysisJobClient;
pub use self::analytics_store::AnalyticsStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credentials::CredentialStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notices::NoticeSink;
