//! Session phases, poll kinds and timer kinds.

use serde::{Deserialize, Serialize};

/// Phase of a polling session.
///
/// State transitions:
/// - Idle -> InitialPoll -> Resolved
/// - InitialPoll -> AwaitingBatchDelay -> Polling -> Resolved
/// - Polling -> Polling (batch interval, until max attempts)
/// - Polling -> Cooldown -> Polling (attempts reset)
/// - any -> Idle (authorization failure halts the session)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    InitialPoll,
    AwaitingBatchDelay,
    Polling,
    Cooldown,
    Resolved,
}

impl SessionPhase {
    /// The timer this phase waits on, if any.
    pub fn awaited_timer(self) -> Option<TimerKind> {
        match self {
            SessionPhase::AwaitingBatchDelay => Some(TimerKind::InitialDelay),
            SessionPhase::Polling => Some(TimerKind::BatchInterval),
            SessionPhase::Cooldown => Some(TimerKind::CooldownResume),
            SessionPhase::Idle | SessionPhase::InitialPoll | SessionPhase::Resolved => None,
        }
    }
}

/// Why a fetch was issued. Decides how its result is continued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    /// The immediate poll on `start`. Never counts as an attempt.
    Initial,
    /// A poll on the batch cadence. Counts towards the cooldown.
    Batch,
    /// An imperative refresh. Never counts as an attempt.
    Manual,
}

/// Timers a session can have pending. At most one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    InitialDelay,
    BatchInterval,
    CooldownResume,
}
