// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use console::style;
use harbor_config::{Config, ConfigManager, RetryConfig, CONFIG_KEYS};
use harbor_core::{Action, AppError, PendingOperation, Record, RecordId, SyncStats, Timestamp};
use harbor_network::{
    ClientConfig, Connectivity, ConnectivityChecker, ConnectivityEvent, ConnectivityMonitor,
    CredentialProvider, Gateway, HttpClient, HttpResourceApi, LivenessProbe, StaticCredentials,
};
use harbor_resilience::RetryPolicy;
use harbor_store::{LocalStore, StoreConfig};
use harbor_sync_engine::{OfflineCache, SyncConfig, SyncError, SyncEvent, TriggerOutcome};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// Resolved configuration for one invocation
pub struct Session {
    pub manager: ConfigManager,
    pub config: Config,
    pub database_path: PathBuf,
    /// Skip the liveness probe and treat the remote as unreachable
    pub offline: bool,
}

impl Session {
    pub fn new(manager: ConfigManager, config: Config, offline: bool) -> Self {
        let database_path = manager.database_path(&config);
        Self {
            manager,
            config,
            database_path,
            offline,
        }
    }

    /// Opens the cache database, creating it and its directory if needed
    pub async fn open_store(&self) -> Result<LocalStore> {
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create data directory {}", parent.display())
            })?;
        }

        let config = StoreConfig::new(self.database_path.to_string_lossy().into_owned());
        LocalStore::open(config)
            .await
            .with_context(|| format!("Failed to open cache at {}", self.database_path.display()))
    }

    /// Opens the cache wired to the configured remote
    ///
    /// Connectivity is probed once up front unless running offline. Writes do
    /// not start background drains; commands drain before exiting instead.
    pub async fn open_cache(&self) -> Result<OfflineCache> {
        let sync_config = SyncConfig::default()
            .with_auto_sync(false)
            .with_batch_creates(self.config.sync.batch_creates);
        let (cache, _) = self.connect(sync_config).await?;
        Ok(cache)
    }

    /// Builds the cache and returns the HTTP transport it talks through
    async fn connect(&self, sync_config: SyncConfig) -> Result<(OfflineCache, Arc<HttpClient>)> {
        let store = self.open_store().await?;
        let remote = &self.config.remote;

        let client = Arc::new(
            HttpClient::with_config(
                ClientConfig::new(remote.base_url.clone())
                    .with_connect_timeout(remote.connect_timeout()),
            )
            .context("Invalid remote configuration")?,
        );

        let credentials: Arc<dyn CredentialProvider> = match &remote.token {
            Some(token) => Arc::new(StaticCredentials::new(token.clone())),
            None => Arc::new(StaticCredentials::none()),
        };

        let gateway = Gateway::new(client.clone(), credentials)
            .with_retry_policy(retry_policy(&self.config.retry))
            .with_timeout(remote.timeout());
        let api = HttpResourceApi::new(gateway).with_resource_path(remote.resource_path.clone());

        let connectivity = if self.offline {
            Connectivity::Offline
        } else {
            let checker = ConnectivityChecker::new(client.clone(), &remote.health_path);
            Connectivity::from_reachable(checker.is_reachable().await)
        };
        log::debug!("Remote {} is {:?}", remote.base_url, connectivity);

        let cache = OfflineCache::new(
            store,
            Arc::new(api),
            ConnectivityMonitor::new(connectivity),
            sync_config,
        );
        Ok((cache, client))
    }
}

/// Create the config file and the cache database
pub async fn init(session: &Session) -> Result<()> {
    let created = session
        .manager
        .initialize()
        .context("Failed to write config file")?;
    if created {
        println!(
            "{} Config written to {}",
            style("✓").green().bold(),
            session.manager.config_path().display()
        );
    } else {
        println!(
            "Config already present at {}",
            session.manager.config_path().display()
        );
    }

    let store = session.open_store().await?;
    store
        .verify_integrity()
        .await
        .context("Cache database failed its integrity check")?;
    println!(
        "{} Cache ready at {}",
        style("✓").green().bold(),
        session.database_path.display()
    );
    Ok(())
}

/// Create or update a record
pub async fn put(session: &Session, matches: &ArgMatches) -> Result<()> {
    let raw = matches
        .get_one::<String>("payload")
        .ok_or_else(|| anyhow::anyhow!("Payload is required"))?;
    let payload = parse_payload(raw)?;

    let cache = session.open_cache().await?;

    let (id, action) = match matches.get_one::<String>("id") {
        Some(id) => {
            let id = parse_id(id)?;
            let action = if cache.query(&id).await?.is_some() {
                Action::Update
            } else {
                Action::Create
            };
            (id, action)
        }
        None => (RecordId::generate(), Action::Create),
    };
    let op = cache.submit(&id, action, payload).await?;

    println!(
        "{} Saved {} (queued {})",
        style("✓").green().bold(),
        style(&op.id).bold(),
        op.action
    );
    sync_after_write(session, &cache).await
}

/// Show one record
pub async fn get(session: &Session, matches: &ArgMatches) -> Result<()> {
    let id = required_id(matches)?;
    let store = session.open_store().await?;

    let record = store
        .records()
        .find(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Record {} not found", id))?;

    println!("{}", format_record_line(&record));
    println!(
        "{}",
        serde_json::to_string_pretty(&record.payload).context("Failed to render payload")?
    );
    Ok(())
}

/// List every cached record
pub async fn list(session: &Session) -> Result<()> {
    let store = session.open_store().await?;
    let records = store.records().get_all().await?;

    if records.is_empty() {
        println!("No records cached. Use 'put' to add one.");
        return Ok(());
    }

    println!("\n{} Cached Records", style(records.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for record in &records {
        println!("{}", format_record_line(record));
    }
    Ok(())
}

/// Delete a record
pub async fn delete(session: &Session, matches: &ArgMatches) -> Result<()> {
    let id = required_id(matches)?;
    let cache = session.open_cache().await?;

    cache.submit(&id, Action::Delete, Value::Null).await?;
    println!("{} Deleted {} locally", style("✓").green().bold(), id);
    sync_after_write(session, &cache).await
}

/// List queued operations in drain order
pub async fn pending(session: &Session) -> Result<()> {
    let store = session.open_store().await?;
    let queued = store.pending().list_pending().await?;

    if queued.is_empty() {
        println!("Nothing queued. All changes synced.");
        return Ok(());
    }

    println!("\n{} Pending Operations", style(queued.len()).bold().cyan());
    println!("{}", "=".repeat(80));
    for op in &queued {
        println!("{}", format_pending_line(op));
        if let Some(error) = &op.last_error {
            println!("    {} {}", style("last error:").red(), truncate(error, 70));
        }
    }
    Ok(())
}

/// Show cache statistics
pub async fn stats(session: &Session) -> Result<()> {
    let store = session.open_store().await?;
    let stats = store.stats().await?;

    println!("\n{}", style("Cache Statistics").bold().cyan());
    println!("{}", "=".repeat(80));
    print!("{}", format_stats(&stats));
    Ok(())
}

/// Drain the queue now
pub async fn sync(session: &Session) -> Result<()> {
    let cache = session.open_cache().await?;
    let outcome = cache.trigger_sync().await?;
    println!("{}", describe_outcome(&outcome));

    if let Some(summary) = outcome.summary() {
        for failure in &summary.failures {
            println!(
                "  {} {} {}: {}",
                style("✗").red(),
                failure.action,
                failure.id,
                failure.error
            );
        }
    }
    Ok(())
}

/// Stay running: probe the remote on the configured interval and drain the
/// queue whenever it comes back
pub async fn watch(session: &Session) -> Result<()> {
    if session.offline {
        bail!("watch needs the remote; run it without --offline");
    }

    let remote = &session.config.remote;
    let sync_config = SyncConfig::default()
        .with_auto_sync(session.config.sync.auto_sync_on_write)
        .with_batch_creates(session.config.sync.batch_creates);
    let (cache, client) = session.connect(sync_config).await?;

    let monitor = Arc::clone(cache.connectivity());
    let probe =
        ConnectivityChecker::new(client, &remote.health_path).with_timeout(remote.timeout());
    monitor.spawn_probe(Arc::new(probe), remote.probe_interval());

    let mut sync_events = cache.subscribe();
    let mut transitions = monitor.subscribe();
    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        style(&remote.base_url).bold(),
        remote.probe_interval_secs
    );
    println!("{}", describe_outcome(&cache.trigger_sync().await?));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = transitions.recv() => match event {
                Ok(ConnectivityEvent::Reconnected) => {
                    println!("{} Remote reachable", style("●").green());
                }
                Ok(ConnectivityEvent::Disconnected) => {
                    println!("{} Remote unreachable; changes stay queued", style("●").red());
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            event = sync_events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe_event(&event) {
                        println!("{}", line);
                    }
                }
                Err(RecvError::Lagged(missed)) => log::warn!("Missed {} sync events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    cache.shutdown();
    monitor.shutdown();
    Ok(())
}

/// One line per sync event worth showing while watching
pub fn describe_event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::DrainStarted { queued } if *queued > 0 => {
            Some(format!("Syncing {} queued operations", queued))
        }
        SyncEvent::DrainStarted { .. } => None,
        SyncEvent::OperationSynced { id, action } => {
            Some(format!("  {} {} {}", style("✓").green(), action, id))
        }
        SyncEvent::OperationFailed(failure) => Some(format!(
            "  {} {} {}: {}",
            style("✗").red(),
            failure.action,
            failure.id,
            failure.error
        )),
        SyncEvent::ReauthenticationRequired => {
            Some("Credentials rejected; update remote.token".to_string())
        }
        SyncEvent::DrainCompleted(summary) if summary.attempted > 0 => Some(describe_outcome(
            &TriggerOutcome::Completed(summary.clone()),
        )),
        SyncEvent::DrainCompleted(_) => None,
    }
}

/// Pull the remote copy of a record
pub async fn refresh(session: &Session, matches: &ArgMatches) -> Result<()> {
    let id = required_id(matches)?;
    let cache = session.open_cache().await?;

    match cache.refresh(&id).await {
        Ok(Some(record)) => {
            println!("{}", format_record_line(&record));
            Ok(())
        }
        Ok(None) => {
            println!("Remote has no record {}", id);
            Ok(())
        }
        Err(SyncError::Offline) => bail!("Remote is unreachable; try again when online"),
        Err(e) => Err(e.into()),
    }
}

/// Empty the cache and the queue
pub async fn clear(session: &Session, matches: &ArgMatches) -> Result<()> {
    if !matches.get_flag("force") {
        bail!("This discards every cached record and unsynced change; re-run with --force");
    }

    let store = session.open_store().await?;
    let stats = store.stats().await?;
    store.clear().await?;
    println!(
        "{} Cleared {} records and {} pending operations",
        style("✓").green().bold(),
        stats.total,
        stats.pending
    );
    Ok(())
}

/// Inspect or change the configuration file
pub fn config(session: &Session, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("get", sub)) => {
            let key = required_arg(sub, "key")?;
            match session.config.get(key)? {
                Some(value) => println!("{}", value),
                None => println!("(unset)"),
            }
        }
        Some(("set", sub)) => {
            let key = required_arg(sub, "key")?;
            let value = required_arg(sub, "value")?;
            session
                .manager
                .update(|config| config.set(key, value))
                .with_context(|| format!("Failed to set {}", key))?;
            println!("{} {} = {}", style("✓").green().bold(), key, value);
        }
        Some(("path", _)) => println!("{}", session.manager.config_path().display()),
        Some(("reset", _)) => {
            session.manager.reset()?;
            println!("{} Config reset to defaults", style("✓").green().bold());
        }
        _ => print!("{}", render_config(&session.config)?),
    }
    Ok(())
}

async fn sync_after_write(session: &Session, cache: &OfflineCache) -> Result<()> {
    if session.config.sync.auto_sync_on_write {
        let outcome = cache.trigger_sync().await?;
        println!("{}", describe_outcome(&outcome));
    } else {
        println!("{}", cache.sync_status().await?.message());
    }
    Ok(())
}

/// Maps the retry section onto the gateway's backoff policy
pub fn retry_policy(retry: &RetryConfig) -> RetryPolicy {
    RetryPolicy::new(retry.max_attempts as usize)
        .with_initial_delay(retry.initial_delay())
        .with_max_delay(retry.max_delay())
        .with_multiplier(retry.multiplier)
        .with_jitter(retry.jitter)
}

pub fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("Payload must be valid JSON")
}

fn parse_id(raw: &str) -> Result<RecordId> {
    RecordId::from_string(raw).context("Invalid record ID")
}

fn required_id(matches: &ArgMatches) -> Result<RecordId> {
    parse_id(required_arg(matches, "id")?)
}

fn required_arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Argument <{}> is required", name))
}

/// Friendly explanation for failures caused by the local store
pub fn storage_hint(err: &anyhow::Error) -> Option<String> {
    let app_error = err.chain().find_map(|cause| {
        cause.downcast_ref::<AppError>().or_else(|| match cause.downcast_ref::<SyncError>() {
            Some(SyncError::Storage(inner)) => Some(inner),
            _ => None,
        })
    })?;

    Some(format!("{}: {}", app_error.severity(), app_error.user_message()))
}

pub fn describe_outcome(outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::Offline => {
            "Saved offline, will sync when the remote is reachable".to_string()
        }
        TriggerOutcome::Scheduled => "A sync is already running".to_string(),
        TriggerOutcome::Completed(summary) => {
            let mut line = format!(
                "Synced {}/{} operations ({} failed, {} remaining)",
                summary.succeeded, summary.attempted, summary.failed, summary.remaining
            );
            if summary.reauth_required {
                line.push_str("; credentials rejected, update remote.token");
            }
            line
        }
    }
}

fn format_record_line(record: &Record) -> String {
    let state = if record.synced {
        style("synced").green()
    } else {
        style("unsynced").yellow()
    };
    format!(
        "{}  [{}]  written {}  {}",
        style(&record.id).bold(),
        state,
        format_timestamp(record.last_written_at),
        truncate(&record.payload.to_string(), 40)
    )
}

fn format_pending_line(op: &PendingOperation) -> String {
    format!(
        "{:<6} {}  since {}  v{}  attempts {}",
        op.action.as_str(),
        style(&op.id).bold(),
        format_timestamp(op.enqueued_at),
        op.version,
        op.attempts
    )
}

fn format_stats(stats: &SyncStats) -> String {
    format!(
        "Records:  {}\nSynced:   {}\nUnsynced: {}\nPending:  {}\n",
        stats.total, stats.synced, stats.unsynced, stats.pending
    )
}

fn render_config(config: &Config) -> Result<String> {
    let mut out = String::new();
    for key in CONFIG_KEYS {
        let value = match (*key, config.get(key)?) {
            ("remote.token", Some(_)) => "<set>".to_string(),
            (_, Some(value)) => value,
            (_, None) => "(unset)".to_string(),
        };
        out.push_str(&format!("{} = {}\n", key, value));
    }
    Ok(out)
}

fn format_timestamp(ts: Timestamp) -> String {
    ts.to_datetime()
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| ts.to_string())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests;
