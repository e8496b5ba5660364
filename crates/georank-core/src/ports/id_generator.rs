//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use std::sync::Arc;

use crate::domain::{RegenerationId, SessionId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator はセッション ID などを生成
pub trait IdGenerator: Send + Sync {
    fn generate_session_id(&self) -> SessionId;

    fn generate_regeneration_id(&self) -> RegenerationId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// テスト時に FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_session_id(&self) -> SessionId {
        SessionId::from(self.next_ulid())
    }

    fn generate_regeneration_id(&self) -> RegenerationId {
        RegenerationId::from(self.next_ulid())
    }
}
