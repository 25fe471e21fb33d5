use super::*;
use harbor_config::LogLevel;
use harbor_sync_engine::{OperationFailure, SyncSummary};
use std::time::Duration;
use tempfile::TempDir;

fn offline_session() -> (Session, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf()).unwrap();
    (Session::new(manager, Config::default(), true), temp_dir)
}

fn sub_matches(args: &[&str]) -> ArgMatches {
    let matches = crate::build_cli()
        .try_get_matches_from(std::iter::once("harbor").chain(args.iter().copied()))
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    sub.clone()
}

fn id(s: &str) -> RecordId {
    RecordId::from_string(s).unwrap()
}

#[test]
fn test_parse_payload() {
    assert_eq!(
        parse_payload(r#"{"seats": 2}"#).unwrap(),
        serde_json::json!({"seats": 2})
    );
    assert!(parse_payload("{not json").is_err());
}

#[test]
fn test_retry_policy_from_config() {
    let policy = retry_policy(&RetryConfig::default());
    assert_eq!(policy.max_attempts(), 3);
    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1000));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
    assert_eq!(policy.max_delay(), Duration::from_secs(10));
}

#[test]
fn test_describe_outcome() {
    assert!(describe_outcome(&TriggerOutcome::Offline).contains("offline"));

    let summary = SyncSummary {
        attempted: 3,
        succeeded: 2,
        failed: 1,
        remaining: 1,
        reauth_required: true,
        ..Default::default()
    };
    let line = describe_outcome(&TriggerOutcome::Completed(summary));
    assert!(line.starts_with("Synced 2/3 operations (1 failed, 1 remaining)"));
    assert!(line.contains("remote.token"));
}

#[test]
fn test_describe_event() {
    assert!(describe_event(&SyncEvent::DrainStarted { queued: 0 }).is_none());
    assert!(describe_event(&SyncEvent::DrainCompleted(SyncSummary::default())).is_none());

    let started = describe_event(&SyncEvent::DrainStarted { queued: 2 }).unwrap();
    assert!(started.contains("2 queued"));

    let failed = describe_event(&SyncEvent::OperationFailed(OperationFailure {
        id: id("r1"),
        action: Action::Update,
        error: "Request rejected with 422: missing field".to_string(),
        retryable: false,
    }))
    .unwrap();
    assert!(failed.contains("r1"));
    assert!(failed.contains("missing field"));

    let reauth = describe_event(&SyncEvent::ReauthenticationRequired).unwrap();
    assert!(reauth.contains("remote.token"));
}

#[tokio::test]
async fn test_watch_requires_remote() {
    let (session, _temp) = offline_session();
    let err = watch(&session).await.unwrap_err();
    assert!(err.to_string().contains("--offline"));
}

#[test]
fn test_storage_hint() {
    let err = anyhow::Error::from(SyncError::Storage(AppError::StorageLocked {
        operation: "submit".to_string(),
    }))
    .context("Failed to save");
    let hint = storage_hint(&err).unwrap();
    assert!(hint.starts_with("Recoverable:"));
    assert!(hint.contains("busy"));

    let err = anyhow::Error::from(AppError::record_not_found("r1"));
    assert!(storage_hint(&err).unwrap().starts_with("Degraded:"));

    assert!(storage_hint(&anyhow::anyhow!("bad input")).is_none());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("12345678", 8), "12345678");
    assert_eq!(truncate("123456789", 8), "12345678...");
    assert_eq!(truncate("ééééé", 2), "éé...");
}

#[test]
fn test_render_config_hides_token() {
    let mut config = Config::default();
    config.remote.token = Some("secret".to_string());
    config.app.log_level = LogLevel::Warn;

    let rendered = render_config(&config).unwrap();
    assert!(rendered.contains("remote.token = <set>"));
    assert!(rendered.contains("app.log_level = warn"));
    assert!(!rendered.contains("secret"));
}

#[tokio::test]
async fn test_put_then_update_coalesces() {
    let (session, _temp) = offline_session();

    put(&session, &sub_matches(&["put", r#"{"rev":1}"#, "--id", "r1"]))
        .await
        .unwrap();
    put(&session, &sub_matches(&["put", r#"{"rev":2}"#, "--id", "r1"]))
        .await
        .unwrap();

    let store = session.open_store().await.unwrap();
    let record = store.records().get(&id("r1")).await.unwrap();
    assert_eq!(record.payload["rev"], 2);
    assert!(!record.synced);

    let queued = store.pending().list_pending().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].action, Action::Create);
}

#[tokio::test]
async fn test_put_without_id_generates_one() {
    let (session, _temp) = offline_session();

    put(&session, &sub_matches(&["put", r#"{"name":"Ada"}"#]))
        .await
        .unwrap();

    let store = session.open_store().await.unwrap();
    let records = store.records().get_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].id.as_str().is_empty());
}

#[tokio::test]
async fn test_delete_queues_removal() {
    let (session, _temp) = offline_session();
    let store = session.open_store().await.unwrap();
    store
        .records()
        .put(&id("r1"), serde_json::json!({"seats": 1}))
        .await
        .unwrap();

    delete(&session, &sub_matches(&["delete", "r1"])).await.unwrap();

    assert!(store.records().find(&id("r1")).await.unwrap().is_none());
    let queued = store.pending().list_pending().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].action, Action::Delete);
}

#[tokio::test]
async fn test_sync_while_offline_keeps_queue() {
    let (session, _temp) = offline_session();
    put(&session, &sub_matches(&["put", "1", "--id", "r1"]))
        .await
        .unwrap();

    sync(&session).await.unwrap();

    let store = session.open_store().await.unwrap();
    assert_eq!(store.stats().await.unwrap().pending, 1);
}

#[tokio::test]
async fn test_refresh_offline_is_error() {
    let (session, _temp) = offline_session();
    let err = refresh(&session, &sub_matches(&["refresh", "r1"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

#[tokio::test]
async fn test_get_missing_record() {
    let (session, _temp) = offline_session();
    let err = get(&session, &sub_matches(&["get", "nope"])).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn test_clear_requires_force() {
    let (session, _temp) = offline_session();
    put(&session, &sub_matches(&["put", "1", "--id", "r1"]))
        .await
        .unwrap();

    assert!(clear(&session, &sub_matches(&["clear"])).await.is_err());
    clear(&session, &sub_matches(&["clear", "--force"]))
        .await
        .unwrap();

    let store = session.open_store().await.unwrap();
    assert_eq!(store.stats().await.unwrap(), SyncStats::default());
}

#[tokio::test]
async fn test_init_creates_config_and_database() {
    let (session, _temp) = offline_session();

    init(&session).await.unwrap();

    assert!(session.manager.config_path().exists());
    assert!(session.database_path.exists());
}

#[test]
fn test_config_set_persists() {
    let (session, _temp) = offline_session();

    config(
        &session,
        &sub_matches(&["config", "set", "retry.max_attempts", "5"]),
    )
    .unwrap();
    assert_eq!(session.manager.load().unwrap().retry.max_attempts, 5);

    assert!(config(&session, &sub_matches(&["config", "set", "retry.max_attempts", "0"])).is_err());
    assert!(config(&session, &sub_matches(&["config", "get", "no.such"])).is_err());
}
