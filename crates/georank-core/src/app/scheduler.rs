//! PollScheduler - セッションごとのタイマー管理
//!
//! # 学習ポイント
//! - tokio::spawn + sleep によるタイマー
//! - JoinHandle::abort() による取り消し（何度呼んでも安全）
//! - 発火したタイマーはセッション ID を運ぶだけで、判断は状態機械が行う

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{SessionId, TimerKind};

/// A timer that elapsed. The receiver must check the session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub session: SessionId,
    pub timer: TimerKind,
}

/// PollScheduler はセッションごとに高々 1 本のタイマーを持つ
///
/// - `schedule()` は既存のタイマーを置き換える
/// - `cancel()` は冪等
/// - 取り消し済みのタイマーは送信しない（abort 済み）。
///   abort と送信が競合しても、受信側のセッション ID 照合で無視される
pub struct PollScheduler {
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    timers: HashMap<SessionId, JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            fired_tx,
            timers: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, session: SessionId, timer: TimerKind, delay: Duration) {
        self.cancel(session);
        debug!(%session, ?timer, delay_ms = delay.as_millis() as u64, "timer armed");
        let tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // ignore send error: the driver may already be gone
            let _ = tx.send(TimerFired { session, timer });
        });
        self.timers.insert(session, handle);
    }

    pub fn cancel(&mut self, session: SessionId) {
        if let Some(handle) = self.timers.remove(&session) {
            handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Is a timer still pending for this session?
    pub fn is_pending(&self, session: SessionId) -> bool {
        self.timers
            .get(&session)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
