// crates/sync-engine/tests/sync_tests.rs
//! Integration tests for the offline cache

use async_trait::async_trait;
use harbor_core::{Action, RecordId};
use harbor_network::{
    ApiRequest, BatchResponse, Connectivity, ConnectivityMonitor, Gateway, GatewayError,
    GatewayResult, HttpResourceApi, RawResponse, ResourceApi, StaticCredentials, Transport,
};
use harbor_resilience::RetryPolicy;
use harbor_store::{LocalStore, StoreConfig};
use harbor_sync_engine::{OfflineCache, SyncConfig, SyncEvent, TriggerOutcome};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Remote double recording every call
#[derive(Default)]
struct FakeRemote {
    rejected: HashMap<String, GatewayError>,
    calls: Mutex<Vec<(Action, String, Value)>>,
    /// When set, the first create parks until released
    gate: Option<Gate>,
}

struct Gate {
    entered: Notify,
    release: Notify,
    used: AtomicUsize,
}

impl FakeRemote {
    fn rejecting(id: &str, error: GatewayError) -> Self {
        Self {
            rejected: HashMap::from([(id.to_string(), error)]),
            ..Default::default()
        }
    }

    fn gated() -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Notify::new(),
                used: AtomicUsize::new(0),
            }),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<(Action, String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, action: Action, id: &RecordId, payload: Value) -> GatewayResult<Option<Value>> {
        self.calls
            .lock()
            .unwrap()
            .push((action, id.to_string(), payload));
        match self.rejected.get(id.as_str()) {
            Some(e) => Err(e.clone()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ResourceApi for FakeRemote {
    async fn create(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>> {
        if let Some(gate) = &self.gate {
            if gate.used.fetch_add(1, Ordering::SeqCst) == 0 {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }
        self.record(Action::Create, id, payload.clone())
    }

    async fn update(&self, id: &RecordId, payload: &Value) -> GatewayResult<Option<Value>> {
        self.record(Action::Update, id, payload.clone())
    }

    async fn delete(&self, id: &RecordId) -> GatewayResult<()> {
        self.record(Action::Delete, id, Value::Null).map(|_| ())
    }

    async fn fetch(&self, _: &RecordId) -> GatewayResult<Option<Value>> {
        Ok(None)
    }

    async fn push_batch(&self, _: &[(RecordId, Value)]) -> GatewayResult<BatchResponse> {
        Err(GatewayError::Configuration("batch disabled".to_string()))
    }
}

fn id(s: &str) -> RecordId {
    RecordId::from_string(s).unwrap()
}

fn manual() -> SyncConfig {
    SyncConfig::default().with_auto_sync(false)
}

async fn offline_cache(remote: Arc<FakeRemote>) -> OfflineCache {
    let store = LocalStore::open_in_memory().await.unwrap();
    OfflineCache::new(
        store,
        remote,
        ConnectivityMonitor::new(Connectivity::Offline),
        manual(),
    )
}

/// Starts online, so no reconnect transition fires a drain of its own
async fn online_cache(remote: Arc<FakeRemote>) -> OfflineCache {
    let store = LocalStore::open_in_memory().await.unwrap();
    OfflineCache::new(
        store,
        remote,
        ConnectivityMonitor::new(Connectivity::Online),
        manual(),
    )
}

#[tokio::test]
async fn test_offline_write_is_durable_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.db").to_string_lossy().into_owned();
    let target = id("reg-1");

    {
        let store = LocalStore::open(StoreConfig::new(path.clone())).await.unwrap();
        let cache = OfflineCache::new(
            store.clone(),
            Arc::new(FakeRemote::default()),
            ConnectivityMonitor::new(Connectivity::Offline),
            SyncConfig::default(),
        );
        cache
            .submit(&target, Action::Create, json!({"seats": 2}))
            .await
            .unwrap();

        let record = cache.query(&target).await.unwrap().unwrap();
        assert_eq!(record.payload["seats"], 2);
        cache.shutdown();
        store.close().await;
    }

    let store = LocalStore::open(StoreConfig::new(path)).await.unwrap();
    let cache = OfflineCache::new(
        store,
        Arc::new(FakeRemote::default()),
        ConnectivityMonitor::new(Connectivity::Offline),
        manual(),
    );

    let record = cache.query(&target).await.unwrap().unwrap();
    assert_eq!(record.payload["seats"], 2);
    assert!(!record.synced);
    assert_eq!(cache.get_sync_stats().await.unwrap().pending, 1);
}

#[tokio::test]
async fn test_repeated_edits_coalesce() {
    let cache = offline_cache(Arc::new(FakeRemote::default())).await;
    let target = id("reg-1");

    let first = cache
        .submit(&target, Action::Update, json!({"rev": 1}))
        .await
        .unwrap();
    cache
        .submit(&target, Action::Update, json!({"rev": 2}))
        .await
        .unwrap();
    cache
        .submit(&target, Action::Update, json!({"rev": 3}))
        .await
        .unwrap();

    let queued = cache.pending_operations().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload["rev"], 3);
    assert_eq!(queued[0].enqueued_at, first.enqueued_at);
}

#[tokio::test]
async fn test_second_drain_attempts_nothing() {
    let remote = Arc::new(FakeRemote::default());
    let cache = online_cache(remote.clone()).await;
    cache.submit(&id("a"), Action::Create, json!(1)).await.unwrap();
    cache.submit(&id("b"), Action::Create, json!(2)).await.unwrap();

    let first = cache.trigger_sync().await.unwrap();
    assert_eq!(first.summary().unwrap().succeeded, 2);

    let second = cache.trigger_sync().await.unwrap();
    let summary = second.summary().unwrap();
    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.remaining, 0);
    assert_eq!(remote.calls().len(), 2);

    let stats = cache.get_sync_stats().await.unwrap();
    assert_eq!(stats.synced, 2);
    assert!(stats.is_settled());
}

#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let remote = Arc::new(FakeRemote::rejecting(
        "second",
        GatewayError::from_status(422, "missing field"),
    ));
    let cache = online_cache(remote.clone()).await;
    cache.submit(&id("first"), Action::Create, json!(1)).await.unwrap();
    cache.submit(&id("second"), Action::Create, json!(2)).await.unwrap();
    cache.submit(&id("third"), Action::Create, json!(3)).await.unwrap();

    let outcome = cache.trigger_sync().await.unwrap();
    let summary = outcome.summary().unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].id, id("second"));
    assert!(!summary.failures[0].retryable);

    let left = cache.pending_operations().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, id("second"));
    assert_eq!(left[0].attempts, 1);

    assert!(cache.query(&id("first")).await.unwrap().unwrap().synced);
    assert!(cache.query(&id("third")).await.unwrap().unwrap().synced);
    assert!(!cache.query(&id("second")).await.unwrap().unwrap().synced);
}

#[tokio::test]
async fn test_reconnect_drains_exactly_once() {
    let remote = Arc::new(FakeRemote::default());
    let cache = offline_cache(remote.clone()).await;
    let mut events = cache.subscribe();
    cache.submit(&id("a"), Action::Create, json!(1)).await.unwrap();
    cache.submit(&id("b"), Action::Update, json!(2)).await.unwrap();
    assert!(remote.calls().is_empty());

    cache.connectivity().set_state(Connectivity::Online);

    let mut drains = 0;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("drain should start after reconnect")
            .unwrap();
        match event {
            SyncEvent::DrainStarted { .. } => drains += 1,
            SyncEvent::DrainCompleted(summary) => {
                assert_eq!(summary.succeeded, 2);
                break;
            }
            _ => {}
        }
    }

    // Repeated reports of the same state do not start another drain
    cache.connectivity().set_state(Connectivity::Online);
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SyncEvent::DrainStarted { .. }) {
            drains += 1;
        }
    }

    assert_eq!(drains, 1);
    assert_eq!(remote.calls().len(), 2);
}

#[tokio::test]
async fn test_offline_trigger_is_deferred() {
    let remote = Arc::new(FakeRemote::default());
    let cache = offline_cache(remote.clone()).await;
    cache.submit(&id("a"), Action::Create, json!(1)).await.unwrap();

    assert_eq!(cache.trigger_sync().await.unwrap(), TriggerOutcome::Offline);
    assert!(remote.calls().is_empty());
    assert_eq!(*cache.pending_count().borrow(), 1);
}

#[tokio::test]
async fn test_edit_during_flight_is_not_lost() {
    let remote = Arc::new(FakeRemote::gated());
    let cache = Arc::new(online_cache(remote.clone()).await);
    let target = id("reg-1");
    cache
        .submit(&target, Action::Create, json!({"rev": 1}))
        .await
        .unwrap();

    let draining = Arc::clone(&cache);
    let drain = tokio::spawn(async move { draining.trigger_sync().await });

    let gate = remote.gate.as_ref().unwrap();
    gate.entered.notified().await;

    // Lands while the create is in flight
    cache
        .submit(&target, Action::Update, json!({"rev": 2}))
        .await
        .unwrap();
    assert_eq!(cache.trigger_sync().await.unwrap(), TriggerOutcome::Scheduled);

    gate.release.notify_one();
    let outcome = drain.await.unwrap().unwrap();
    let summary = outcome.summary().unwrap();

    // First pass: accepted but superseded; follow-up pass sends the newer edit
    assert_eq!(summary.superseded, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.remaining, 0);

    // The remote already holds the entity, so the edit goes out as an update
    let calls = remote.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, Action::Create);
    assert_eq!(calls[0].2["rev"], 1);
    assert_eq!(calls[1].0, Action::Update);
    assert_eq!(calls[1].2["rev"], 2);

    let record = cache.query(&target).await.unwrap().unwrap();
    assert!(record.synced);
    assert_eq!(record.payload["rev"], 2);
}

#[tokio::test]
async fn test_follow_up_pass_skips_rejected_entries() {
    let remote = Arc::new(FakeRemote {
        rejected: HashMap::from([(
            "bad".to_string(),
            GatewayError::from_status(422, "missing field"),
        )]),
        ..FakeRemote::gated()
    });
    let cache = Arc::new(online_cache(remote.clone()).await);
    cache.submit(&id("bad"), Action::Update, json!(1)).await.unwrap();
    cache.submit(&id("slow"), Action::Create, json!(2)).await.unwrap();

    let draining = Arc::clone(&cache);
    let drain = tokio::spawn(async move { draining.trigger_sync().await });

    let gate = remote.gate.as_ref().unwrap();
    gate.entered.notified().await;
    assert_eq!(cache.trigger_sync().await.unwrap(), TriggerOutcome::Scheduled);
    gate.release.notify_one();

    let outcome = drain.await.unwrap().unwrap();
    let summary = outcome.summary().unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.remaining, 1);
    let sent_bad = remote
        .calls()
        .iter()
        .filter(|(_, target, _)| target == "bad")
        .count();
    assert_eq!(sent_bad, 1);

    // A new edit to the rejected id is eligible again
    cache.submit(&id("bad"), Action::Update, json!(3)).await.unwrap();
    let retry = cache.trigger_sync().await.unwrap();
    assert_eq!(retry.summary().unwrap().attempted, 1);
}

#[tokio::test]
async fn test_write_while_online_syncs_automatically() {
    let remote = Arc::new(FakeRemote::default());
    let store = LocalStore::open_in_memory().await.unwrap();
    let cache = OfflineCache::new(
        store,
        remote.clone(),
        ConnectivityMonitor::new(Connectivity::Online),
        SyncConfig::default(),
    );
    let mut pending = cache.pending_count();

    cache.submit(&id("a"), Action::Create, json!(1)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), pending.wait_for(|n| *n == 0))
        .await
        .expect("write should drain on its own")
        .unwrap();
    assert_eq!(remote.calls().len(), 1);
}

/// Transport that always answers 503
struct Unavailable {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for Unavailable {
    async fn send(&self, _: &ApiRequest, _: Option<&str>) -> GatewayResult<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawResponse::new(503, r#"{"success":false,"error":"maintenance"}"#))
    }
}

#[tokio::test]
async fn test_retryable_failure_stays_queued_after_retries() {
    let transport = Arc::new(Unavailable {
        calls: AtomicUsize::new(0),
    });
    let gateway = Gateway::new(transport.clone(), Arc::new(StaticCredentials::none()))
        .with_retry_policy(
            RetryPolicy::new(3)
                .with_initial_delay(Duration::from_millis(5))
                .with_max_delay(Duration::from_millis(20)),
        );
    let api: Arc<dyn ResourceApi> = Arc::new(HttpResourceApi::new(gateway));

    let store = LocalStore::open_in_memory().await.unwrap();
    let cache = OfflineCache::new(
        store,
        api,
        ConnectivityMonitor::new(Connectivity::Online),
        manual(),
    );
    cache
        .submit(&id("reg-1"), Action::Update, json!({"seats": 4}))
        .await
        .unwrap();

    let outcome = cache.trigger_sync().await.unwrap();
    let summary = outcome.summary().unwrap();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].retryable);
    assert!(summary.failures[0].error.contains("maintenance"));
    assert_eq!(summary.remaining, 1);
}
