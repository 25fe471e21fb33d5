// crates/network/src/connectivity.rs
//! Connectivity tracking: the online/offline state machine, platform
//! reachability feeds and the liveness probe used when no feed exists

use crate::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use harbor_resilience::with_timeout;
use reqwest::Method;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Capacity of the transition event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Current reachability of the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connectivity {
    /// The remote can be reached
    Online,
    /// The remote cannot be reached
    Offline,
}

impl Connectivity {
    /// Maps a reachability flag
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }

    /// Returns true when online
    pub fn is_online(self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// A state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Offline → Online
    Reconnected,
    /// Online → Offline
    Disconnected,
}

/// Owns the connectivity state and announces transitions
///
/// Listeners get a [`ConnectivityEvent`] only on an actual change; repeated
/// reports of the same state are absorbed.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<Connectivity>,
    events: broadcast::Sender<ConnectivityEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor seeded with the platform's current state
    pub fn new(initial: Connectivity) -> Arc<Self> {
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        log::debug!("Connectivity monitor starting {:?}", initial);

        Arc::new(Self {
            state,
            events,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Returns the current state
    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Returns true when online
    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Records a new state, returning the transition it caused, if any
    pub fn set_state(&self, next: Connectivity) -> Option<ConnectivityEvent> {
        let previous = self.state.send_replace(next);

        let event = match (previous, next) {
            (Connectivity::Offline, Connectivity::Online) => ConnectivityEvent::Reconnected,
            (Connectivity::Online, Connectivity::Offline) => ConnectivityEvent::Disconnected,
            _ => return None,
        };

        log::info!("Connectivity changed: {:?} -> {:?}", previous, next);
        // Nobody listening is fine
        let _ = self.events.send(event);
        Some(event)
    }

    /// Subscribes to transitions
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Watches the current state
    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Consumes a platform reachability feed until its sender is dropped
    ///
    /// The task only holds a weak reference; dropping the monitor stops it.
    pub fn attach_platform_feed(self: &Arc<Self>, mut feed: mpsc::Receiver<bool>) {
        let monitor = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(reachable) = feed.recv().await {
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.set_state(Connectivity::from_reachable(reachable));
            }
            log::debug!("Platform reachability feed closed");
        });
        self.track(handle);
    }

    /// Polls `probe` every `interval` and feeds the result into the state
    ///
    /// Runs until [`shutdown`](Self::shutdown) or until the monitor is dropped.
    pub fn spawn_probe(self: &Arc<Self>, probe: Arc<dyn LivenessProbe>, interval: Duration) {
        let monitor: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.is_reachable().await;
                match monitor.upgrade() {
                    Some(monitor) => {
                        monitor.set_state(Connectivity::from_reachable(reachable));
                    }
                    None => break,
                }
            }
        });
        self.track(handle);
    }

    /// Stops every feed and probe task started by this monitor
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }

    fn track(&self, handle: JoinHandle<()>) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(_) => handle.abort(),
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Answers whether the remote service is reachable right now
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Performs one check
    async fn is_reachable(&self) -> bool;
}

/// Probe sending `HEAD` to the service's health path
///
/// Any HTTP answer counts as reachable; only transport failures and
/// timeouts count as offline.
#[derive(Clone)]
pub struct ConnectivityChecker {
    transport: Arc<dyn Transport>,
    health_segments: Vec<String>,
    timeout: Duration,
}

impl ConnectivityChecker {
    /// Creates a checker for `health_path` (e.g. `"health"`)
    pub fn new(transport: Arc<dyn Transport>, health_path: &str) -> Self {
        Self {
            transport,
            health_segments: health_path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Sets how long one check may take
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Measures the round trip of one check
    pub async fn estimate_latency(&self) -> Option<Duration> {
        let start = tokio::time::Instant::now();
        self.is_reachable().await.then(|| start.elapsed())
    }
}

#[async_trait]
impl LivenessProbe for ConnectivityChecker {
    async fn is_reachable(&self) -> bool {
        let request = ApiRequest::new(Method::HEAD, self.health_segments.iter().cloned());
        match with_timeout(self.timeout, self.transport.send(&request, None)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                log::debug!("Liveness probe failed: {}", e);
                false
            }
            Err(_) => {
                log::debug!("Liveness probe timed out after {:?}", self.timeout);
                false
            }
        }
    }
}
