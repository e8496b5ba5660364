//! Poll policy: decides how long each timer waits.

use std::time::Duration;

use crate::domain::TimerKind;

/// Delays and bounds for polling one analysis.
///
/// Cadence:
/// - one immediate initial poll
/// - `initial_delay` once, then a batch poll every `batch_interval`
/// - after `max_batch_attempts` unresolved batch polls, wait `cooldown`
///   and start a fresh batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub batch_interval: Duration,
    pub max_batch_attempts: u32,
    pub cooldown: Duration,
}

impl PollPolicy {
    /// Production defaults: an analysis usually takes several minutes.
    pub fn default_v1() -> Self {
        Self {
            initial_delay: Duration::from_secs(5 * 60),
            batch_interval: Duration::from_secs(2 * 60),
            max_batch_attempts: 5,
            cooldown: Duration::from_secs(10 * 60),
        }
    }

    pub fn delay_for(&self, timer: TimerKind) -> Duration {
        match timer {
            TimerKind::InitialDelay => self.initial_delay,
            TimerKind::BatchInterval => self.batch_interval,
            TimerKind::CooldownResume => self.cooldown,
        }
    }

    /// Longest wait before the "taking longer than expected" notice:
    /// `initial_delay + max_batch_attempts * batch_interval + cooldown`.
    pub fn worst_case_until_notice(&self) -> Duration {
        self.initial_delay
            + self.batch_interval.saturating_mul(self.max_batch_attempts)
            + self.cooldown
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::default_v1()
    }
}
