//! Aggregation loop
//!
//! [`HudOrchestrator`] owns one reader per source and composes their latest
//! outputs into an immutable [`RenderSnapshot`]. Once started it recomposes
//! on a fixed tick, on every event and on every connection status change,
//! and publishes the result on a watch channel.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::HudConfig;
use crate::events::{ConnectionStatus, EventReader, HudEvent, HudEventKind};
use crate::settings::{SettingsReader, SettingsSnapshot};
use crate::transcript::{ContextHealth, ModelCapacities, TranscriptReader, TranscriptSnapshot};
use crate::usage::{ProcessUsageSource, UsageData, UsageReader, UsageSource};

/// Everything the status line needs for one frame
///
/// Every source is independently optional.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub status: ConnectionStatus,
    pub last_event: Option<HudEvent>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
    pub cwd: Option<PathBuf>,
    pub transcript_path: Option<PathBuf>,
    pub transcript: Option<Arc<TranscriptSnapshot>>,
    pub context_health: Option<ContextHealth>,
    pub usage: Option<Arc<UsageData>>,
    pub settings: Option<Arc<SettingsSnapshot>>,
    /// Formatted time since the session started
    pub elapsed: String,
}

impl RenderSnapshot {
    /// Model to display: the transcript's, falling back to settings
    pub fn model(&self) -> Option<&str> {
        self.transcript
            .as_ref()
            .and_then(|t| t.model.as_deref())
            .or_else(|| self.settings.as_ref().map(|s| s.model.as_str()))
    }
}

/// Format an elapsed duration as `<1m`, `Nm` or `NhMm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let minutes = elapsed.as_secs() / 60;
    if minutes == 0 {
        "<1m".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h{}m", minutes / 60, minutes % 60)
    }
}

#[derive(Default)]
struct SessionState {
    transcript_path: Option<PathBuf>,
    last_event: Option<HudEvent>,
    session_id: Option<String>,
    cwd: Option<PathBuf>,
}

struct Inner<S> {
    events: EventReader,
    transcript: TranscriptReader,
    usage: Option<UsageReader<S>>,
    settings: SettingsReader,
    capacities: ModelCapacities,
    tick: Duration,
    started_at: Mutex<Instant>,
    session: Mutex<SessionState>,
    snapshot_tx: watch::Sender<Arc<RenderSnapshot>>,
}

impl<S: UsageSource> Inner<S> {
    fn compose(&self) -> RenderSnapshot {
        let (transcript_path, last_event, session_id, cwd) = {
            let session = self.session.lock();
            (
                session.transcript_path.clone(),
                session.last_event.clone(),
                session.session_id.clone(),
                session.cwd.clone(),
            )
        };

        let transcript = transcript_path
            .as_deref()
            .and_then(|path| self.transcript.read(path));
        let context_health = transcript
            .as_ref()
            .map(|t| ContextHealth::for_snapshot(t, &self.capacities));

        RenderSnapshot {
            status: self.events.status(),
            last_event,
            last_event_at: self.events.last_event_at(),
            session_id,
            cwd,
            transcript_path,
            transcript,
            context_health,
            usage: self.usage.as_ref().and_then(|u| u.cached()),
            settings: self.settings.read(),
            elapsed: format_elapsed(self.started_at.lock().elapsed()),
        }
    }

    fn observe(&self, event: HudEvent) {
        let mut session = self.session.lock();

        if event.event == HudEventKind::SessionStart
            && session.session_id.as_deref() != Some(event.session.as_str())
        {
            debug!(session = %event.session, "New session, restarting clock");
            *self.started_at.lock() = Instant::now();
        }
        session.session_id = Some(event.session.clone());

        if let Some(cwd) = event.cwd.as_deref().filter(|c| !c.is_empty()) {
            session.cwd = Some(PathBuf::from(cwd));
        }

        if let Some(path) = event.transcript_path() {
            let path = path.to_path_buf();
            if session.transcript_path.as_ref() != Some(&path) {
                info!(path = %path.display(), "Following transcript");
                if let Some(previous) = session.transcript_path.replace(path) {
                    self.transcript.forget(&previous);
                }
            }
        }

        session.last_event = Some(event);
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.compose()));
    }

    /// Kick off a usage fetch in the background unless one is running
    fn refresh_usage(self: &Arc<Self>) {
        let Some(usage) = self.usage.as_ref() else {
            return;
        };
        if usage.is_fetching() {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(usage) = inner.usage.as_ref() {
                usage.read().await;
            }
        });
    }
}

/// Composes reader outputs into render snapshots
pub struct HudOrchestrator<S = ProcessUsageSource> {
    inner: Arc<Inner<S>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HudOrchestrator<ProcessUsageSource> {
    /// Orchestrator with the default `claude /usage` source
    pub fn from_config(config: &HudConfig) -> Self {
        let usage = config
            .usage
            .enabled
            .then(|| UsageReader::from_config(&config.usage));
        Self::new(config, usage)
    }
}

impl<S: UsageSource> HudOrchestrator<S> {
    /// Build an orchestrator. `usage` is `None` when usage reporting is off.
    ///
    /// Nothing runs until [`HudOrchestrator::start`].
    pub fn new(config: &HudConfig, usage: Option<UsageReader<S>>) -> Self {
        let inner = Inner {
            events: EventReader::new(config.event_channel.clone(), &config.reconnect),
            transcript: TranscriptReader::new(),
            usage,
            settings: SettingsReader::from_config(config),
            capacities: ModelCapacities::from_config(config),
            tick: config.tick_interval(),
            started_at: Mutex::new(Instant::now()),
            session: Mutex::new(SessionState::default()),
            snapshot_tx: watch::channel(Arc::new(empty_snapshot())).0,
        };

        Self {
            inner: Arc::new(inner),
            task: Mutex::new(None),
        }
    }

    /// Follow a specific transcript file until an event names another one
    pub fn set_transcript_path(&self, path: impl Into<PathBuf>) {
        self.inner.session.lock().transcript_path = Some(path.into());
    }

    pub fn transcript_path(&self) -> Option<PathBuf> {
        self.inner.session.lock().transcript_path.clone()
    }

    /// The event channel reader
    pub fn events(&self) -> &EventReader {
        &self.inner.events
    }

    /// Build a snapshot from the current state of every source
    pub fn compose(&self) -> RenderSnapshot {
        self.inner.compose()
    }

    /// Fold one event into the session state, as the loop does
    pub fn observe(&self, event: HudEvent) {
        self.inner.observe(event);
    }

    /// Fetch usage now (subject to the reader's interval and single flight)
    pub async fn refresh_usage(&self) -> Option<Arc<UsageData>> {
        match self.inner.usage.as_ref() {
            Some(usage) => usage.read().await,
            None => None,
        }
    }

    /// One-shot snapshot: waits at most `usage_wait` for usage data, then
    /// composes without starting the loop
    pub async fn compose_once(&self, usage_wait: Duration) -> RenderSnapshot {
        if tokio::time::timeout(usage_wait, self.refresh_usage())
            .await
            .is_err()
        {
            debug!("Usage not available within {:?}", usage_wait);
        }
        self.compose()
    }

    /// Receiver for published snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<RenderSnapshot>> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Start the event reader and the aggregation loop.
    ///
    /// Must be called within a Tokio runtime. Calling it again while running
    /// only returns a new receiver.
    pub fn start(&self) -> watch::Receiver<Arc<RenderSnapshot>> {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return self.subscribe();
        }

        let receiver = self.subscribe();
        let events = self.inner.events.subscribe_events();
        let status = self.inner.events.subscribe_status();
        self.inner.events.start();

        info!(
            channel = %self.inner.events.path().display(),
            tick_ms = self.inner.tick.as_millis() as u64,
            "Orchestrator started"
        );
        *task = Some(tokio::spawn(run_loop(Arc::clone(&self.inner), events, status)));
        receiver
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Close the event reader and stop the loop. Idempotent.
    pub fn shutdown(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            debug!("Orchestrator stopped");
        }
        self.inner.events.close();
    }
}

impl<S> Drop for HudOrchestrator<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

fn empty_snapshot() -> RenderSnapshot {
    RenderSnapshot {
        status: ConnectionStatus::Connecting,
        last_event: None,
        last_event_at: None,
        session_id: None,
        cwd: None,
        transcript_path: None,
        transcript: None,
        context_health: None,
        usage: None,
        settings: None,
        elapsed: format_elapsed(Duration::ZERO),
    }
}

async fn run_loop<S: UsageSource>(
    inner: Arc<Inner<S>>,
    mut events: broadcast::Receiver<HudEvent>,
    mut status: broadcast::Receiver<ConnectionStatus>,
) {
    let mut ticker = tokio::time::interval(inner.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                inner.refresh_usage();
            }
            received = events.recv() => match received {
                Ok(event) => inner.observe(event),
                Err(RecvError::Lagged(n)) => debug!("Event subscription lagged by {}", n),
                Err(RecvError::Closed) => break,
            },
            received = status.recv() => match received {
                Ok(status) => debug!(%status, "Channel status changed"),
                Err(RecvError::Lagged(n)) => debug!("Status subscription lagged by {}", n),
                Err(RecvError::Closed) => break,
            },
        }

        inner.publish();
    }
}
