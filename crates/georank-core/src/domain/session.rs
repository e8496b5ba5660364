//! Polling session: the machine's own mutable state for one product.

use super::cooldown::{CooldownCheck, CooldownGuard};
use super::ids::SessionId;
use super::product::ProductId;
use super::state::{PollKind, SessionPhase, TimerKind};
use super::trigger::TriggerClock;

/// State of one arming of the state machine for one product.
///
/// Design:
/// - Owned exclusively by `AnalysisStateMachine`; nothing else writes it.
/// - Switching product always creates a new session (new `SessionId`).
/// - `in_flight` is the single-flight lock: at most one fetch at a time.
/// - `resolved` implies `pending_timer.is_none()` and `in_flight.is_none()`.
#[derive(Debug, Clone)]
pub struct PollingSession {
    pub id: SessionId,
    pub product: ProductId,
    pub phase: SessionPhase,
    pub trigger: TriggerClock,
    pub cooldown: CooldownGuard,

    /// Kind of the fetch currently in flight, if any.
    pub in_flight: Option<PollKind>,

    /// The timer currently armed, if any.
    pub pending_timer: Option<TimerKind>,

    pub resolved: bool,
}

impl PollingSession {
    pub fn new(id: SessionId, product: ProductId, trigger: TriggerClock, max_attempts: u32) -> Self {
        Self {
            id,
            product,
            phase: SessionPhase::Idle,
            trigger,
            cooldown: CooldownGuard::new(max_attempts),
            in_flight: None,
            pending_timer: None,
            resolved: false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.cooldown.attempts()
    }

    /// Take the single-flight lock. Returns false if a fetch is already running
    /// or the session is resolved.
    pub fn begin_fetch(&mut self, kind: PollKind) -> bool {
        if self.resolved || self.in_flight.is_some() {
            return false;
        }
        if kind == PollKind::Initial {
            self.phase = SessionPhase::InitialPoll;
        }
        self.in_flight = Some(kind);
        true
    }

    /// Release the lock, returning the kind of the fetch that just finished.
    pub fn finish_fetch(&mut self) -> Option<PollKind> {
        self.in_flight.take()
    }

    pub fn arm_timer(&mut self, timer: TimerKind) {
        self.pending_timer = Some(timer);
    }

    /// Consume a fired timer. Returns false if it is not the timer this
    /// session is waiting on.
    pub fn take_timer(&mut self, timer: TimerKind) -> bool {
        if self.resolved || self.pending_timer != Some(timer) {
            return false;
        }
        self.pending_timer = None;
        true
    }

    /// Count one unresolved batch poll.
    pub fn record_unresolved_batch(&mut self) -> CooldownCheck {
        let check = self.cooldown.record_unresolved();
        if matches!(check, CooldownCheck::Enter { .. }) {
            self.phase = SessionPhase::Cooldown;
        }
        check
    }

    pub fn resume_from_cooldown(&mut self) -> bool {
        if !self.cooldown.resume() {
            return false;
        }
        self.phase = SessionPhase::Polling;
        true
    }

    /// Adoption: terminal, inert until restarted.
    pub fn mark_resolved(&mut self) {
        self.phase = SessionPhase::Resolved;
        self.resolved = true;
        self.trigger.clear();
        self.cooldown.cancel();
        self.pending_timer = None;
        self.in_flight = None;
    }

    /// Authorization failure: stop polling without adopting anything.
    pub fn halt(&mut self) {
        self.phase = SessionPhase::Idle;
        self.cooldown.cancel();
        self.pending_timer = None;
        self.in_flight = None;
    }
}
