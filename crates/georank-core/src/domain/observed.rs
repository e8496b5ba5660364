//! Observable state surface for UI collaborators.

use serde::Serialize;

use super::record::{AnalysisRecord, AnalysisStatus};

/// Read-only snapshot of the state machine, recomputed after every transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    pub current_analytics: Option<AnalysisRecord>,
    pub previous_analytics: Option<AnalysisRecord>,
    pub is_loading: bool,
    /// Set when the active session resolves; cleared when a rerun is requested.
    pub data_ready: bool,
    pub is_analyzing: bool,
}

impl ObservedState {
    /// The record the UI should show right now.
    ///
    /// A completed current record wins, else the last known completed record.
    /// Never regresses from a completed record to an in-progress one.
    pub fn display_analytics(&self) -> Option<&AnalysisRecord> {
        self.current_analytics
            .as_ref()
            .filter(|r| r.status == AnalysisStatus::Completed)
            .or(self.previous_analytics.as_ref())
    }
}
