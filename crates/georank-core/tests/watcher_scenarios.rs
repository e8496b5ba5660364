//! End-to-end polling scenarios driven through `AnalysisWatcher` on virtual time.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use georank_core::domain::{
    AnalysisRecord, AnalysisStatus, ClientError, EpochMs, Notice, ObservedState, ProductId,
};
use georank_core::impls::{InMemoryAnalyticsStore, InMemoryCredentials, RecordingNoticeSink};
use georank_core::machine::FetchResult;
use georank_core::ports::{AnalysisJobClient, AnalyticsStore, CredentialStore, FixedClock};
use georank_core::{AnalysisWatcher, PollPolicy, WatcherBuilder, WatcherError};
use serde_json::json;

/// Fake API: answers from a per-product script, `Ok(None)` once exhausted.
#[derive(Default)]
struct ScriptedClient {
    latency: Duration,
    regeneration_latency: Duration,
    fetch_log: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, VecDeque<FetchResult>>>,
    in_flight: Mutex<HashMap<String, usize>>,
    peak_per_product: AtomicUsize,
    fetches: AtomicUsize,
    regenerations: AtomicUsize,
    reject_regeneration: Mutex<Option<ClientError>>,
}

impl ScriptedClient {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    fn script(self, product: &str, results: Vec<FetchResult>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(product.to_string(), results.into());
        self
    }

    fn fetched_products(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak_per_product.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisJobClient for ScriptedClient {
    async fn fetch_latest_analysis(
        &self,
        product: &ProductId,
        _credential: &str,
    ) -> Result<Option<AnalysisRecord>, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetch_log.lock().unwrap().push(product.as_str().to_string());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let n = in_flight.entry(product.as_str().to_string()).or_default();
            *n += 1;
            self.peak_per_product.fetch_max(*n, Ordering::SeqCst);
        }

        tokio::time::sleep(self.latency).await;

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(product.as_str())
            .and_then(|q| q.pop_front());
        if let Some(n) = self.in_flight.lock().unwrap().get_mut(product.as_str()) {
            *n -= 1;
        }
        next.unwrap_or(Ok(None))
    }

    async fn start_regeneration(&self, _product: &ProductId, _credential: &str) -> Result<(), ClientError> {
        self.regenerations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.regeneration_latency).await;
        match self.reject_regeneration.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct Harness {
    watcher: AnalysisWatcher,
    client: Arc<ScriptedClient>,
    credentials: Arc<InMemoryCredentials>,
    store: Arc<InMemoryAnalyticsStore>,
    notices: Arc<RecordingNoticeSink>,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn ms(offset_secs: i64) -> EpochMs {
    EpochMs::new(now().timestamp_millis() + offset_secs * 1000)
}

fn harness(client: ScriptedClient, token: Option<&str>) -> Harness {
    harness_with_store(client, token, InMemoryAnalyticsStore::new())
}

fn harness_with_store(client: ScriptedClient, token: Option<&str>, store: InMemoryAnalyticsStore) -> Harness {
    let client = Arc::new(client);
    let credentials = Arc::new(InMemoryCredentials::new(token.map(str::to_string)));
    let store = Arc::new(store);
    let notices = Arc::new(RecordingNoticeSink::new());
    let watcher = WatcherBuilder::new()
        .policy(PollPolicy::default_v1())
        .client(client.clone())
        .credentials(credentials.clone())
        .store(store.clone())
        .notices(notices.clone())
        .clock(Arc::new(FixedClock::new(now())))
        .build()
        .unwrap();
    Harness {
        watcher,
        client,
        credentials,
        store,
        notices,
    }
}

fn record(id: &str, product: &str, status: AnalysisStatus, ts: Option<EpochMs>) -> AnalysisRecord {
    AnalysisRecord {
        id: id.to_string(),
        product_id: ProductId::new(product),
        status,
        timestamp: ts,
        payload: json!({ "id": id, "geo_score": 42 }),
    }
}

fn completions(notices: &[Notice]) -> Vec<String> {
    notices
        .iter()
        .filter_map(|n| match n {
            Notice::AnalysisCompleted { analysis_id, .. } => Some(analysis_id.clone()),
            _ => None,
        })
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn resolves_after_initial_delay_and_one_batch_poll() {
    let done = record("a-2", "p1", AnalysisStatus::Completed, Some(ms(60)));
    let client = ScriptedClient::default().script(
        "p1",
        vec![
            Ok(None),
            Ok(Some(record("a-2", "p1", AnalysisStatus::InProgress, Some(ms(0))))),
            Ok(Some(done.clone())),
        ],
    );
    let h = harness(client, Some("token"));
    let started = tokio::time::Instant::now();

    h.watcher.start(ProductId::new("p1")).unwrap();
    let state = h.watcher.wait_for(|s| s.data_ready).await.unwrap();

    assert_eq!(state.current_analytics, Some(done.clone()));
    assert!(!state.is_loading);
    assert!(!state.is_analyzing);
    assert!(started.elapsed() >= Duration::from_secs(300 + 120));
    assert_eq!(h.client.fetches(), 3);
    assert_eq!(h.client.peak(), 1);
    assert_eq!(h.store.load(&ProductId::new("p1")).await.unwrap(), Some(done));
    assert_eq!(completions(&h.notices.notices()), vec!["a-2".to_string()]);

    // resolved: no further polling
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(h.client.fetches(), 3);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn regeneration_ignores_completion_older_than_trigger() {
    let stale = record("old", "p1", AnalysisStatus::Completed, Some(ms(-3600)));
    let tie = record("tie", "p1", AnalysisStatus::Completed, Some(ms(0)));
    let fresh = record("new", "p1", AnalysisStatus::Completed, Some(ms(420)));
    let client = ScriptedClient::default().script(
        "p1",
        vec![Ok(Some(stale.clone())), Ok(Some(tie)), Ok(Some(fresh.clone()))],
    );
    let h = harness(client, Some("token"));

    h.watcher.regenerate(ProductId::new("p1")).await.unwrap();
    settle().await;

    let mid = h.watcher.observe();
    assert_eq!(mid.current_analytics, Some(stale));
    assert!(mid.is_loading);
    assert!(mid.is_analyzing);
    assert!(!mid.data_ready);

    let state = h.watcher.wait_for(|s| s.data_ready).await.unwrap();
    assert_eq!(state.current_analytics, Some(fresh));
    assert_eq!(h.client.regenerations.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.fetches(), 3);
    assert_eq!(completions(&h.notices.notices()), vec!["new".to_string()]);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_batches_cool_down_with_a_single_notice() {
    let mut script: Vec<FetchResult> = vec![Ok(None)];
    for i in 0..10 {
        if i % 3 == 0 {
            script.push(Err(ClientError::Http { status: 502 }));
        } else {
            script.push(Ok(Some(record("a", "p1", AnalysisStatus::Error, Some(ms(i))))));
        }
    }
    script.push(Ok(Some(record("a", "p1", AnalysisStatus::Completed, Some(ms(99))))));
    let h = harness(ScriptedClient::default().script("p1", script), Some("token"));
    let started = tokio::time::Instant::now();

    h.watcher.start(ProductId::new("p1")).unwrap();
    h.watcher.wait_for(|s| s.data_ready).await.unwrap();

    // 300 + 4*120 -> cooldown 600 -> 4*120 -> cooldown 600 -> resume
    assert!(started.elapsed() >= Duration::from_secs(300 + 480 + 600 + 480 + 600));
    assert_eq!(h.client.fetches(), 12);
    assert_eq!(h.client.peak(), 1);

    let notices = h.notices.notices();
    let taking_longer: Vec<_> = notices
        .iter()
        .filter(|n| matches!(n, Notice::TakingLonger { .. }))
        .collect();
    assert_eq!(taking_longer.len(), 1);
    assert!(matches!(
        taking_longer[0],
        Notice::TakingLonger { retry_in, .. } if *retry_in == Duration::from_secs(600)
    ));
    let resumed = notices
        .iter()
        .filter(|n| matches!(n, Notice::CooldownResumed { .. }))
        .count();
    assert_eq!(resumed, 2);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn unauthorized_response_halts_and_invalidates() {
    let client = ScriptedClient::default().script("p1", vec![Err(ClientError::Unauthorized)]);
    let h = harness(client, Some("expired"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    settle().await;

    assert_eq!(h.credentials.invalidations(), 1);
    assert_eq!(h.credentials.access_token(), None);
    let state = h.watcher.observe();
    assert!(!state.is_analyzing);
    assert!(!state.is_loading);

    tokio::time::sleep(Duration::from_secs(7200)).await;
    assert_eq!(h.client.fetches(), 1);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn missing_credential_aborts_without_io() {
    let h = harness(ScriptedClient::default(), None);

    h.watcher.start(ProductId::new("p1")).unwrap();
    tokio::time::sleep(Duration::from_secs(7200)).await;

    assert_eq!(h.client.fetches(), 0);
    assert_eq!(h.credentials.invalidations(), 1);
    assert!(!h.watcher.observe().is_analyzing);

    let err = h.watcher.regenerate(ProductId::new("p1")).await.unwrap_err();
    assert!(matches!(err, WatcherError::Regeneration(ClientError::MissingCredential)));
    assert_eq!(h.client.regenerations.load(Ordering::SeqCst), 0);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_regeneration_does_not_start_polling() {
    let client = ScriptedClient::default();
    *client.reject_regeneration.lock().unwrap() = Some(ClientError::Http { status: 503 });
    let h = harness(client, Some("token"));

    let err = h.watcher.regenerate(ProductId::new("p1")).await.unwrap_err();
    assert!(matches!(
        err,
        WatcherError::Regeneration(ClientError::Http { status: 503 })
    ));
    settle().await;
    assert_eq!(h.client.fetches(), 0);
    assert_eq!(h.credentials.invalidations(), 0);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn late_regeneration_accept_does_not_take_over_new_product() {
    let client = ScriptedClient {
        regeneration_latency: Duration::from_secs(5),
        ..ScriptedClient::default()
    };
    let h = harness(client, Some("token"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    settle().await;
    let (accepted, ()) = tokio::join!(h.watcher.regenerate(ProductId::new("p1")), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.watcher.start(ProductId::new("p2")).unwrap();
    });
    accepted.unwrap();
    settle().await;
    assert_eq!(h.client.fetched_products(), vec!["p1", "p2"]);

    // p2 keeps its own cadence: the initial delay elapses into a batch poll
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(h.client.fetched_products(), vec!["p1", "p2", "p2"]);
    assert!(h.watcher.observe().is_analyzing);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn regeneration_accepted_after_stop_stays_stopped() {
    let client = ScriptedClient {
        regeneration_latency: Duration::from_secs(5),
        ..ScriptedClient::default()
    };
    let h = harness(client, Some("token"));

    let (accepted, ()) = tokio::join!(h.watcher.regenerate(ProductId::new("p1")), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.watcher.stop().unwrap();
    });
    accepted.unwrap();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(h.client.fetches(), 0);
    assert!(!h.watcher.observe().is_analyzing);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn slow_regeneration_accept_rearms_same_product() {
    let fresh = record("new", "p1", AnalysisStatus::Completed, Some(ms(60)));
    let client = ScriptedClient {
        regeneration_latency: Duration::from_secs(5),
        ..ScriptedClient::default()
    }
    .script("p1", vec![Ok(None), Ok(Some(fresh.clone()))]);
    let h = harness(client, Some("token"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    h.watcher.regenerate(ProductId::new("p1")).await.unwrap();
    let state = h.watcher.wait_for(|s| s.data_ready).await.unwrap();

    assert_eq!(state.current_analytics, Some(fresh));
    assert_eq!(h.client.fetched_products(), vec!["p1", "p1"]);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn switching_product_drops_late_response_of_old_session() {
    let old_done = record("a-old", "p1", AnalysisStatus::Completed, Some(ms(0)));
    let client = ScriptedClient::with_latency(Duration::from_secs(5))
        .script("p1", vec![Ok(Some(old_done))])
        .script("p2", vec![Ok(None)]);
    let h = harness(client, Some("token"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.watcher.start(ProductId::new("p2")).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let state = h.watcher.observe();
    assert_eq!(state.current_analytics, None);
    assert!(!state.data_ready);
    assert!(state.is_analyzing);
    assert!(h.notices.notices().is_empty());
    assert_eq!(h.store.len().await, 0);
    assert_eq!(h.client.peak(), 1);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn manual_polls_never_overlap() {
    let client = ScriptedClient::with_latency(Duration::from_secs(30));
    let h = harness(client, Some("token"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    for _ in 0..3 {
        h.watcher.poll_now().unwrap();
    }
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.client.fetches(), 1);

    h.watcher.poll_now().unwrap();
    h.watcher.poll_now().unwrap();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(h.client.fetches(), 2);
    assert_eq!(h.client.peak(), 1);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn cached_record_is_shown_while_polling() {
    let cached = record("a-1", "p1", AnalysisStatus::Completed, Some(ms(-86_400)));
    let store = InMemoryAnalyticsStore::new();
    store.save(&ProductId::new("p1"), &cached).await.unwrap();
    let client = ScriptedClient::default().script(
        "p1",
        vec![Ok(Some(record("a-2", "p1", AnalysisStatus::InProgress, Some(ms(0)))))],
    );
    let h = harness_with_store(client, Some("token"), store);

    h.watcher
        .start_new_analysis(ProductId::new("p1"), ms(0))
        .unwrap();
    settle().await;

    let state = h.watcher.observe();
    assert_eq!(state.previous_analytics, Some(cached.clone()));
    assert_eq!(state.display_analytics(), Some(&cached));
    assert!(state.is_analyzing);
    assert!(!state.is_loading);
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn logout_clears_everything() {
    let done = record("a-1", "p1", AnalysisStatus::Completed, Some(ms(0)));
    let client = ScriptedClient::default().script("p1", vec![Ok(Some(done))]);
    let h = harness(client, Some("token"));

    h.watcher.start(ProductId::new("p1")).unwrap();
    h.watcher.wait_for(|s| s.data_ready).await.unwrap();
    assert_eq!(h.store.len().await, 1);

    h.watcher.logout().await.unwrap();
    settle().await;

    assert_eq!(h.store.len().await, 0);
    assert_eq!(h.credentials.access_token(), None);
    assert_eq!(h.watcher.observe(), ObservedState::default());
    h.watcher.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_handle() {
    let h = harness(ScriptedClient::default(), Some("token"));
    let mut updates = h.watcher.subscribe();
    h.watcher.shutdown_and_join().await;
    assert!(updates.changed().await.is_err());
}
