//! App - アプリケーション層
//!
//! 純粋な状態機械（`machine`）を ports と tokio につなぎます。
//!
//! # 主要コンポーネント
//! - **WatcherBuilder**: 依存の組み立てと起動時検証
//! - **AnalysisWatcher**: 状態機械を所有する actor と、そのハンドル
//! - **PollScheduler**: セッションごとのタイマー
//! - **AccessTokenGuard**: 認証情報のチェック

pub mod builder;
pub mod guard;
pub mod scheduler;
pub mod watcher;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, WatcherBuilder};
pub use self::guard::AccessTokenGuard;
pub use self::scheduler::{PollScheduler, TimerFired};
pub use self::watcher::{AnalysisWatcher, WatcherDeps, WatcherError};
