//! CooldownGuard: bounds the number of unresolved batch polls.

/// Result of recording one unresolved batch poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownCheck {
    /// Keep polling on the batch cadence.
    Continue { attempts: u32 },

    /// Enter cooldown. `notify` is true only the first time in a session.
    Enter { notify: bool },
}

/// Counts batch attempts and decides when to back off into a cooldown.
///
/// The initial poll and manual polls never reach this guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownGuard {
    attempts: u32,
    max_attempts: u32,
    cooling: bool,
    notified: bool,
}

impl CooldownGuard {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts: max_attempts.max(1),
            cooling: false,
            notified: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one batch poll that did not resolve the session.
    ///
    /// `attempts` resets to 0 on cooldown entry, not on resume.
    pub fn record_unresolved(&mut self) -> CooldownCheck {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts < self.max_attempts {
            return CooldownCheck::Continue {
                attempts: self.attempts,
            };
        }
        self.attempts = 0;
        self.cooling = true;
        let notify = !self.notified;
        self.notified = true;
        CooldownCheck::Enter { notify }
    }

    /// Leave cooldown. Returns false if the guard was not cooling.
    pub fn resume(&mut self) -> bool {
        if !self.cooling {
            return false;
        }
        self.cooling = false;
        self.attempts = 0;
        true
    }

    /// Drop an active cooldown without resuming (resolution, supersession).
    pub fn cancel(&mut self) {
        self.cooling = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enters_after_exactly_max_attempts() {
        let mut guard = CooldownGuard::new(5);
        for n in 1..5 {
            assert_eq!(guard.record_unresolved(), CooldownCheck::Continue { attempts: n });
        }
        assert_eq!(guard.record_unresolved(), CooldownCheck::Enter { notify: true });
        assert_eq!(guard.attempts(), 0);
        assert!(guard.resume());
    }

    #[test]
    fn notifies_once_per_guard() {
        let mut guard = CooldownGuard::new(1);
        assert_eq!(guard.record_unresolved(), CooldownCheck::Enter { notify: true });
        assert!(guard.resume());
        assert_eq!(guard.record_unresolved(), CooldownCheck::Enter { notify: false });
    }

    #[test]
    fn resume_is_noop_when_not_cooling() {
        let mut guard = CooldownGuard::new(3);
        guard.record_unresolved();
        assert!(!guard.resume());
        assert_eq!(guard.attempts(), 1);
    }

    #[test]
    fn zero_max_is_clamped() {
        let mut guard = CooldownGuard::new(0);
        assert_eq!(guard.record_unresolved(), CooldownCheck::Enter { notify: true });
    }
}
