//! AnalysisWatcher - 状態機械を駆動する非同期ドライバ
//!
//! # 学習ポイント
//! - 1 タスク（actor）が状態機械を所有し、コマンドは mpsc で受け取る
//! - タイマー発火とフェッチ完了も同じループに合流させる（tokio::select!）
//! - 観測状態は watch チャネルで公開する
//!
//! 状態機械が返した Effect はこのループの中でだけ実行されるので、
//! 状態へのアクセスは常に直列です。

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::guard::AccessTokenGuard;
use crate::app::scheduler::{PollScheduler, TimerFired};
use crate::domain::{ClientError, EpochMs, ObservedState, ProductId, SessionId};
use crate::machine::{AnalysisStateMachine, Effect, FetchResult, StartRequest};
use crate::policy::PollPolicy;
use crate::ports::{AnalysisJobClient, AnalyticsStore, Clock, CredentialStore, IdGenerator, NoticeSink};

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("watcher is not running")]
    Closed,

    #[error("regeneration was not accepted: {0}")]
    Regeneration(#[source] ClientError),

    #[error("failed to clear cached analytics: {0}")]
    Store(#[from] crate::domain::StoreError),
}

/// Collaborators the driver talks to.
#[derive(Clone)]
pub struct WatcherDeps {
    pub client: Arc<dyn AnalysisJobClient>,
    pub credentials: Arc<dyn CredentialStore>,
    pub store: Arc<dyn AnalyticsStore>,
    pub notices: Arc<dyn NoticeSink>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

enum Command {
    Start {
        product: ProductId,
        trigger: Option<EpochMs>,
    },
    Regenerate {
        product: ProductId,
        reply: oneshot::Sender<Result<(), WatcherError>>,
    },
    PollNow,
    Stop,
    Logout {
        reply: oneshot::Sender<Result<(), WatcherError>>,
    },
    Shutdown,
}

struct FetchDone {
    session: SessionId,
    result: FetchResult,
}

struct RegenerationDone {
    product: ProductId,
    trigger: EpochMs,
    /// `Driver::epoch` when the request went out.
    epoch: u64,
    result: Result<(), ClientError>,
    reply: oneshot::Sender<Result<(), WatcherError>>,
}

/// Handle to the running driver task.
///
/// Dropping the handle stops the driver: the command channel closes and the
/// loop exits after cancelling every timer.
pub struct AnalysisWatcher {
    commands: mpsc::UnboundedSender<Command>,
    observed: watch::Receiver<ObservedState>,
    join: JoinHandle<()>,
}

impl AnalysisWatcher {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(policy: PollPolicy, deps: WatcherDeps) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let (regen_tx, regen_rx) = mpsc::unbounded_channel();
        let (observed_tx, observed_rx) = watch::channel(ObservedState::default());

        let driver = Driver {
            machine: AnalysisStateMachine::new(policy),
            guard: AccessTokenGuard::new(Arc::clone(&deps.credentials)),
            scheduler: PollScheduler::new(timer_tx),
            deps,
            fetch_tx,
            regen_tx,
            observed_tx,
            epoch: 0,
        };
        let join = tokio::spawn(driver.run(cmd_rx, timer_rx, fetch_rx, regen_rx));

        Self {
            commands: cmd_tx,
            observed: observed_rx,
            join,
        }
    }

    /// 画面表示相当: 最新結果の監視を開始する
    pub fn start(&self, product: ProductId) -> Result<(), WatcherError> {
        self.send(Command::Start {
            product,
            trigger: None,
        })
    }

    /// 「新しい分析」を伴う遷移。`trigger` より新しい完了だけを採用する
    pub fn start_new_analysis(&self, product: ProductId, trigger: EpochMs) -> Result<(), WatcherError> {
        self.send(Command::Start {
            product,
            trigger: Some(trigger),
        })
    }

    /// バックエンドに再生成を依頼し、受理されたらセッションを張り直す
    pub async fn regenerate(&self, product: ProductId) -> Result<(), WatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Regenerate { product, reply })?;
        rx.await.map_err(|_| WatcherError::Closed)?
    }

    pub fn poll_now(&self) -> Result<(), WatcherError> {
        self.send(Command::PollNow)
    }

    pub fn stop(&self) -> Result<(), WatcherError> {
        self.send(Command::Stop)
    }

    /// 停止して、表示中の結果・キャッシュ・認証情報を破棄する
    pub async fn logout(&self) -> Result<(), WatcherError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Logout { reply })?;
        rx.await.map_err(|_| WatcherError::Closed)?
    }

    /// Snapshot of the observed state.
    pub fn observe(&self) -> ObservedState {
        self.observed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ObservedState> {
        self.observed.clone()
    }

    /// Wait until the observed state satisfies `pred`.
    pub async fn wait_for(
        &self,
        mut pred: impl FnMut(&ObservedState) -> bool,
    ) -> Result<ObservedState, WatcherError> {
        let mut rx = self.observed.clone();
        let state = rx
            .wait_for(|s| pred(s))
            .await
            .map_err(|_| WatcherError::Closed)?;
        Ok(state.clone())
    }

    /// Stop the driver and wait for it to exit.
    pub async fn shutdown_and_join(self) {
        // ignore send error: the driver may already be gone
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.join.await;
    }

    fn send(&self, cmd: Command) -> Result<(), WatcherError> {
        self.commands.send(cmd).map_err(|_| WatcherError::Closed)
    }
}

struct Driver {
    machine: AnalysisStateMachine,
    guard: AccessTokenGuard,
    scheduler: PollScheduler,
    deps: WatcherDeps,
    fetch_tx: mpsc::UnboundedSender<FetchDone>,
    regen_tx: mpsc::UnboundedSender<RegenerationDone>,
    observed_tx: watch::Sender<ObservedState>,

    /// Bumped by every command that replaces or drops the session.
    epoch: u64,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut timers: mpsc::UnboundedReceiver<TimerFired>,
        mut fetches: mpsc::UnboundedReceiver<FetchDone>,
        mut regenerations: mpsc::UnboundedReceiver<RegenerationDone>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None | Some(Command::Shutdown) => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(fired) = timers.recv() => {
                    let effects = self.machine.on_timer(fired.session, fired.timer);
                    self.execute(effects).await;
                }
                Some(done) = fetches.recv() => {
                    let effects = self.machine.on_fetch(done.session, done.result);
                    self.execute(effects).await;
                }
                Some(done) = regenerations.recv() => self.finish_regeneration(done).await,
            }
            self.publish();
        }

        let effects = self.machine.stop();
        self.execute(effects).await;
        self.scheduler.cancel_all();
        self.publish();
        debug!("analysis watcher stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { product, trigger } => {
                self.epoch += 1;
                let cached = self.load_cached(&product).await;
                let effects = self.machine.start(StartRequest {
                    session_id: self.deps.ids.generate_session_id(),
                    product,
                    trigger,
                    cached,
                });
                self.execute(effects).await;
            }
            Command::Regenerate { product, reply } => self.begin_regeneration(product, reply),
            Command::PollNow => {
                let effects = self.machine.poll_now();
                self.execute(effects).await;
            }
            Command::Stop => {
                self.epoch += 1;
                let effects = self.machine.stop();
                self.execute(effects).await;
            }
            Command::Logout { reply } => {
                self.epoch += 1;
                let effects = self.machine.reset();
                self.execute(effects).await;
                self.guard.reject();
                let cleared = self.deps.store.clear().await.map_err(WatcherError::from);
                info!("logged out, analytics cleared");
                // ignore send error: the caller may have given up waiting
                let _ = reply.send(cleared);
            }
            Command::Shutdown => {}
        }
    }

    fn begin_regeneration(
        &mut self,
        product: ProductId,
        reply: oneshot::Sender<Result<(), WatcherError>>,
    ) {
        // 依頼前の時刻を基準にする（受理後に作られる記録は必ずこれより新しい）
        let trigger = self.deps.clock.now_epoch_ms();
        let credential = match self.guard.credential() {
            Ok(c) => c,
            Err(err) => {
                warn!(product = %product, "regeneration refused: no credential");
                let _ = reply.send(Err(WatcherError::Regeneration(err)));
                return;
            }
        };

        let regeneration_id = self.deps.ids.generate_regeneration_id();
        info!(product = %product, %regeneration_id, "requesting regeneration");
        let client = Arc::clone(&self.deps.client);
        let tx = self.regen_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = client.start_regeneration(&product, &credential).await;
            let _ = tx.send(RegenerationDone {
                product,
                trigger,
                epoch,
                result,
                reply,
            });
        });
    }

    async fn finish_regeneration(&mut self, done: RegenerationDone) {
        let RegenerationDone {
            product,
            trigger,
            epoch,
            result,
            reply,
        } = done;

        match result {
            Ok(()) if self.is_superseded(epoch, &product) => {
                debug!(product = %product, "regeneration accepted after the session moved on, not re-arming");
                let _ = reply.send(Ok(()));
            }
            Ok(()) => {
                self.epoch += 1;
                let cached = self.load_cached(&product).await;
                let session_id = self.deps.ids.generate_session_id();
                let effects = self.machine.regenerate(session_id, product, trigger, cached);
                self.execute(effects).await;
                let _ = reply.send(Ok(()));
            }
            Err(err) => {
                warn!(product = %product, error = %err, "regeneration rejected");
                if err.is_fatal() {
                    self.guard.reject();
                }
                let _ = reply.send(Err(WatcherError::Regeneration(err)));
            }
        }
    }

    /// A regeneration sent at `epoch` may re-arm only if nothing replaced the
    /// session since, or the active session is for the same product.
    fn is_superseded(&self, epoch: u64, product: &ProductId) -> bool {
        let same_product = self
            .machine
            .session()
            .is_some_and(|s| &s.product == product);
        epoch != self.epoch && !same_product
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Fetch {
                    session,
                    product,
                    kind,
                } => match self.guard.credential() {
                    Ok(credential) => {
                        debug!(%session, product = %product, ?kind, "fetch issued");
                        let client = Arc::clone(&self.deps.client);
                        let tx = self.fetch_tx.clone();
                        tokio::spawn(async move {
                            let result = client.fetch_latest_analysis(&product, &credential).await;
                            let _ = tx.send(FetchDone { session, result });
                        });
                    }
                    Err(err) => {
                        // 認証情報がなければ I/O せずに即座に失敗として扱う
                        queue.extend(self.machine.on_fetch(session, Err(err)));
                    }
                },
                Effect::ArmTimer {
                    session,
                    timer,
                    delay,
                } => self.scheduler.schedule(session, timer, delay),
                Effect::CancelTimers { session } => self.scheduler.cancel(session),
                Effect::Persist { product, record } => {
                    if let Err(err) = self.deps.store.save(&product, &record).await {
                        warn!(product = %product, error = %err, "failed to persist analytics");
                    }
                }
                Effect::Notify(notice) => self.deps.notices.notify(notice),
                Effect::Unauthorized { session } => {
                    warn!(%session, "credential rejected, invalidating");
                    self.guard.reject();
                }
            }
        }
    }

    async fn load_cached(&self, product: &ProductId) -> Option<crate::domain::AnalysisRecord> {
        match self.deps.store.load(product).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(product = %product, error = %err, "failed to read cached analytics");
                None
            }
        }
    }

    fn publish(&self) {
        let next = self.machine.observe();
        self.observed_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
