//! AnalysisStateMachine: pure transitions over one `PollingSession`.
//!
//! Every entry point mutates the machine synchronously and returns the list of
//! side effects the caller must execute (fetches, timers, persistence,
//! notices). Nothing in here awaits or touches the network.
//!
//! Transition rules for a fetched record `r` of the active session:
//! - terminal (`completed`/`failed`) and newer than the trigger: adopt, resolve
//! - terminal but not newer: stale, show it, keep loading, keep polling
//! - `in_progress`/`error`/unknown: show it, keep polling
//! - no record yet: keep loading, keep polling
//! - transient error: keep polling; fatal error: halt and report

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{
    AnalysisRecord, AnalysisStatus, ClientError, CooldownCheck, EpochMs, Notice, ObservedState,
    PollKind, PollingSession, ProductId, SessionId, SessionPhase, TimerKind, TriggerClock,
};
use crate::policy::PollPolicy;

/// Result of one fetch as seen by the machine.
pub type FetchResult = Result<Option<AnalysisRecord>, ClientError>;

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Issue exactly one fetch for the session.
    Fetch {
        session: SessionId,
        product: ProductId,
        kind: PollKind,
    },

    /// Arm a timer. Replaces any timer the session already has.
    ArmTimer {
        session: SessionId,
        timer: TimerKind,
        delay: Duration,
    },

    /// Cancel every pending timer of the session. Idempotent.
    CancelTimers { session: SessionId },

    /// Write the adopted completed record to the durable cache.
    Persist {
        product: ProductId,
        record: AnalysisRecord,
    },

    /// Show a one-time informational notice.
    Notify(Notice),

    /// Authorization failed; hand over to the auth collaborator.
    Unauthorized { session: SessionId },
}

/// Input of `start`.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub session_id: SessionId,
    pub product: ProductId,

    /// Set when a *new* analysis was explicitly requested.
    pub trigger: Option<EpochMs>,

    /// Last completed record persisted for this product, if any.
    pub cached: Option<AnalysisRecord>,
}

/// What a fetched record means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Adopt,
    Stale,
    Pending,
}

/// Pure classification of a record against the session's trigger clock.
pub fn judge(trigger: &TriggerClock, record: &AnalysisRecord) -> Verdict {
    if !record.status.is_terminal() {
        return Verdict::Pending;
    }
    if trigger.is_newer(record.timestamp) {
        Verdict::Adopt
    } else {
        Verdict::Stale
    }
}

/// The polling state machine. One instance serves one consuming UI; it holds
/// at most one active session at a time.
#[derive(Debug)]
pub struct AnalysisStateMachine {
    policy: PollPolicy,
    session: Option<PollingSession>,
    observed: ObservedState,

    /// Last completion signature announced, per product.
    announced: HashMap<ProductId, String>,
}

impl AnalysisStateMachine {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            session: None,
            observed: ObservedState::default(),
            announced: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn session(&self) -> Option<&PollingSession> {
        self.session.as_ref()
    }

    pub fn observe(&self) -> ObservedState {
        self.observed.clone()
    }

    /// (Re)initialize a session and issue the initial poll.
    ///
    /// No-op for the same product while its session is resolved or has a
    /// fetch in flight, unless a trigger is supplied.
    pub fn start(&mut self, req: StartRequest) -> Vec<Effect> {
        let mut effects = Vec::new();
        let same_product = self.session.as_ref().map(|s| s.product == req.product);

        if let Some(current) = &self.session
            && same_product == Some(true)
            && req.trigger.is_none()
            && (current.resolved || current.is_in_flight())
        {
            debug!(session = %current.id, product = %current.product, "start ignored, session already active");
            return effects;
        }

        if let Some(old) = self.session.take() {
            if same_product == Some(false) {
                info!(session = %old.id, product = %old.product, next = %req.product, "session superseded by product switch");
            }
            effects.push(Effect::CancelTimers { session: old.id });
        }

        if same_product == Some(true) {
            // Keep showing what we had while the new run is in flight.
            if self.observed.previous_analytics.is_none() {
                self.observed.previous_analytics = req.cached;
            }
            // a rerun is not ready until it resolves
            if req.trigger.is_some() {
                self.observed.data_ready = false;
            }
        } else {
            self.observed = ObservedState {
                previous_analytics: req.cached,
                ..ObservedState::default()
            };
        }

        let mut session = PollingSession::new(
            req.session_id,
            req.product.clone(),
            TriggerClock::new(req.trigger),
            self.policy.max_batch_attempts,
        );
        session.begin_fetch(PollKind::Initial);

        self.observed.is_loading = true;
        self.observed.is_analyzing = true;

        info!(
            session = %session.id,
            product = %session.product,
            trigger = ?req.trigger.map(EpochMs::as_millis),
            notice_after_secs = self.policy.worst_case_until_notice().as_secs(),
            "session started"
        );
        effects.push(Effect::Fetch {
            session: session.id,
            product: session.product.clone(),
            kind: PollKind::Initial,
        });
        self.session = Some(session);
        effects
    }

    /// Re-arm for a freshly requested analysis. The caller has already had the
    /// regeneration accepted by the backend.
    pub fn regenerate(
        &mut self,
        session_id: SessionId,
        product: ProductId,
        now: EpochMs,
        cached: Option<AnalysisRecord>,
    ) -> Vec<Effect> {
        self.start(StartRequest {
            session_id,
            product,
            trigger: Some(now),
            cached,
        })
    }

    /// Imperative refresh. Subject to single-flight; ignored when resolved or halted.
    pub fn poll_now(&mut self) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.phase == SessionPhase::Idle || !session.begin_fetch(PollKind::Manual) {
            debug!(session = %session.id, "manual poll dropped");
            return Vec::new();
        }
        vec![Effect::Fetch {
            session: session.id,
            product: session.product.clone(),
            kind: PollKind::Manual,
        }]
    }

    /// A timer of `session_id` fired.
    pub fn on_timer(&mut self, session_id: SessionId, timer: TimerKind) -> Vec<Effect> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.id != session_id || !session.take_timer(timer) {
            debug!(session = %session_id, ?timer, "stale timer ignored");
            return Vec::new();
        }

        let mut effects = Vec::new();
        match timer {
            TimerKind::InitialDelay => session.phase = SessionPhase::Polling,
            TimerKind::BatchInterval => {}
            TimerKind::CooldownResume => {
                if session.resume_from_cooldown() {
                    info!(session = %session.id, product = %session.product, "cooldown over, resuming batch polling");
                    effects.push(Effect::Notify(Notice::CooldownResumed {
                        product: session.product.clone(),
                    }));
                }
            }
        }

        if session.begin_fetch(PollKind::Batch) {
            effects.push(Effect::Fetch {
                session: session.id,
                product: session.product.clone(),
                kind: PollKind::Batch,
            });
        } else {
            // A manual fetch is running; its continuation re-arms the cadence.
            debug!(session = %session.id, ?timer, "timer fired during fetch, dropped");
        }
        effects
    }

    /// A fetch of `session_id` completed.
    pub fn on_fetch(&mut self, session_id: SessionId, result: FetchResult) -> Vec<Effect> {
        let Some(mut session) = self.session.take() else {
            return Vec::new();
        };
        if session.id != session_id || session.resolved {
            debug!(session = %session_id, "late response dropped");
            self.session = Some(session);
            return Vec::new();
        }
        let Some(kind) = session.finish_fetch() else {
            debug!(session = %session_id, "response without outstanding fetch dropped");
            self.session = Some(session);
            return Vec::new();
        };

        let effects = match result {
            Err(err) if err.is_fatal() => {
                warn!(session = %session.id, product = %session.product, error = %err, "authorization failure, halting session");
                session.halt();
                self.observed.is_loading = false;
                self.observed.is_analyzing = false;
                vec![
                    Effect::CancelTimers { session: session.id },
                    Effect::Unauthorized { session: session.id },
                ]
            }
            Err(err) => {
                warn!(session = %session.id, product = %session.product, error = %err, "fetch failed, will retry");
                self.continue_polling(&mut session, kind)
            }
            Ok(None) => {
                debug!(session = %session.id, "no analysis yet");
                self.observed.is_loading = true;
                self.continue_polling(&mut session, kind)
            }
            Ok(Some(record)) => match judge(&session.trigger, &record) {
                Verdict::Adopt => self.adopt(&mut session, record),
                Verdict::Stale => {
                    info!(
                        session = %session.id,
                        status = record.status.as_str(),
                        timestamp = ?record.timestamp.map(EpochMs::as_millis),
                        trigger = ?session.trigger.marked_at().map(EpochMs::as_millis),
                        "stale record ignored"
                    );
                    self.observed.current_analytics = Some(record);
                    self.observed.is_loading = true;
                    self.continue_polling(&mut session, kind)
                }
                Verdict::Pending => {
                    debug!(session = %session.id, status = record.status.as_str(), "analysis still running");
                    self.observed.current_analytics = Some(record);
                    self.observed.is_loading = self.observed.previous_analytics.is_none();
                    self.continue_polling(&mut session, kind)
                }
            },
        };

        self.session = Some(session);
        effects
    }

    /// Unmount: cancel everything, keep the last shown records.
    pub fn stop(&mut self) -> Vec<Effect> {
        self.observed.is_loading = false;
        self.observed.is_analyzing = false;
        match self.session.take() {
            Some(session) => {
                debug!(session = %session.id, "session stopped");
                vec![Effect::CancelTimers { session: session.id }]
            }
            None => Vec::new(),
        }
    }

    /// Logout: stop and forget everything that was shown.
    pub fn reset(&mut self) -> Vec<Effect> {
        let effects = self.stop();
        self.observed = ObservedState::default();
        self.announced.clear();
        effects
    }

    fn adopt(&mut self, session: &mut PollingSession, record: AnalysisRecord) -> Vec<Effect> {
        info!(
            session = %session.id,
            product = %session.product,
            status = record.status.as_str(),
            analysis = %record.id,
            "analysis resolved"
        );
        session.mark_resolved();

        let mut effects = vec![Effect::CancelTimers { session: session.id }];
        let completed = record.status == AnalysisStatus::Completed;
        if completed {
            self.observed.previous_analytics = Some(record.clone());
            effects.push(Effect::Persist {
                product: session.product.clone(),
                record: record.clone(),
            });
        }

        let signature = record.completion_signature();
        if self.announced.get(&session.product) != Some(&signature) {
            self.announced.insert(session.product.clone(), signature);
            let product = session.product.clone();
            let analysis_id = record.id.clone();
            effects.push(Effect::Notify(if completed {
                Notice::AnalysisCompleted {
                    product,
                    analysis_id,
                }
            } else {
                Notice::AnalysisFailed {
                    product,
                    analysis_id,
                }
            }));
        }

        self.observed.current_analytics = Some(record);
        self.observed.data_ready = true;
        self.observed.is_loading = false;
        self.observed.is_analyzing = false;
        effects
    }

    fn continue_polling(&mut self, session: &mut PollingSession, kind: PollKind) -> Vec<Effect> {
        let mut effects = Vec::new();
        let timer = match kind {
            PollKind::Initial => {
                session.phase = SessionPhase::AwaitingBatchDelay;
                Some(TimerKind::InitialDelay)
            }
            PollKind::Batch => match session.record_unresolved_batch() {
                CooldownCheck::Continue { attempts } => {
                    debug!(session = %session.id, attempts, "batch poll unresolved");
                    session.phase = SessionPhase::Polling;
                    Some(TimerKind::BatchInterval)
                }
                CooldownCheck::Enter { notify } => {
                    info!(
                        session = %session.id,
                        product = %session.product,
                        cooldown_ms = self.policy.cooldown.as_millis() as u64,
                        "batch exhausted, entering cooldown"
                    );
                    effects.push(Effect::CancelTimers { session: session.id });
                    session.pending_timer = None;
                    if notify {
                        effects.push(Effect::Notify(Notice::TakingLonger {
                            product: session.product.clone(),
                            retry_in: self.policy.cooldown,
                        }));
                    }
                    Some(TimerKind::CooldownResume)
                }
            },
            PollKind::Manual if session.pending_timer.is_none() => session.phase.awaited_timer(),
            PollKind::Manual => None,
        };

        if let Some(timer) = timer {
            let delay = self.policy.delay_for(timer);
            session.arm_timer(timer);
            effects.push(Effect::ArmTimer {
                session: session.id,
                timer,
                delay,
            });
        }
        effects
    }
}
