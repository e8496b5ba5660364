//! TriggerClock: the staleness oracle.

use super::timestamp::EpochMs;

/// Records when a *new* analysis was explicitly requested.
///
/// While a mark is set, only records strictly newer than the mark may resolve
/// the session. The backend may keep serving the previous completed analysis
/// for a while after a regeneration is accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerClock {
    mark: Option<EpochMs>,
}

impl TriggerClock {
    pub fn new(mark: Option<EpochMs>) -> Self {
        Self { mark }
    }

    pub fn mark(&mut self, now: EpochMs) {
        self.mark = Some(now);
    }

    /// Only called on adoption.
    pub fn clear(&mut self) {
        self.mark = None;
    }

    pub fn marked_at(&self) -> Option<EpochMs> {
        self.mark
    }

    /// `true` if no mark is set, or `candidate > mark`.
    ///
    /// Ties are not newer. A candidate without a timestamp is only newer when
    /// no mark is set.
    pub fn is_newer(&self, candidate: Option<EpochMs>) -> bool {
        match (self.mark, candidate) {
            (None, _) => true,
            (Some(mark), Some(ts)) => ts > mark,
            (Some(_), None) => false,
        }
    }
}
