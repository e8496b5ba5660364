//! georank-core
//!
//! Polling core for long-running GeoRank analyses.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, record, timestamp, session, trigger, cooldown, observed, events, errors）
//! - **policy**: タイマー間隔と試行上限
//! - **machine**: 純粋な状態遷移（Effect を返すだけで I/O しない）
//! - **ports**: 抽象化レイヤー（AnalysisJobClient, AnalyticsStore, CredentialStore, Clock, など）
//! - **impls**: 実装（HTTP クライアント、ファイル/メモリのキャッシュ、通知）
//! - **app**: 状態機械を tokio 上で駆動する AnalysisWatcher
//! - **config** / **observability**: 設定読み込みとログ初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod machine;
pub mod observability;
pub mod policy;
pub mod ports;

pub use app::{AnalysisWatcher, WatcherBuilder, WatcherError};
pub use config::{AppConfig, ConfigError};
pub use machine::{AnalysisStateMachine, Effect, StartRequest};
pub use policy::PollPolicy;
