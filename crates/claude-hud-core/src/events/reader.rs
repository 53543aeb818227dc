//! Event channel reader with reconnect backoff.
//!
//! One background task per open channel:
//! 1. waits (polling) until the channel path exists
//! 2. opens it without blocking on a missing writer
//! 3. decodes newline-terminated JSON records and broadcasts them
//! 4. on end-of-data or error, schedules a reconnect with backoff
//!
//! A regular file is tailed rather than replayed: the reader remembers how
//! far it got and resumes there, starting over only when the file shrinks or
//! is replaced by another file.
//!
//! All I/O failures end up as status transitions. `close()` and
//! `switch_path()` abort the task; a generation counter keeps a task that is
//! still unwinding from publishing anything after it has been replaced.

use std::io::SeekFrom;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncSeekExt, BufReader};
use tokio::net::unix::pipe;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::backoff::Backoff;
use super::types::{ConnectionStatus, HudEvent};
use crate::config::ReconnectConfig;

const STATUS_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 1024;

type ChannelStream = Box<dyn AsyncRead + Send + Unpin>;

/// Read position in a regular-file channel
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct FileCursor {
    /// `(device, inode)` of the file the offset belongs to
    identity: Option<(u64, u64)>,
    /// End of the last complete line consumed
    offset: u64,
}

/// An opened channel
struct Channel {
    stream: ChannelStream,
    /// Regular files advance the cursor; FIFOs have nothing to resume
    tracks_offset: bool,
}

struct ChannelState {
    path: PathBuf,
    status: ConnectionStatus,
    attempts: u32,
    last_event_at: Option<DateTime<Utc>>,
    closed: bool,
    generation: u64,
    cursor: FileCursor,
    task: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<ChannelState>,
    status_tx: broadcast::Sender<ConnectionStatus>,
    event_tx: broadcast::Sender<HudEvent>,
    backoff: Backoff,
    existence_poll: Duration,
}

impl Shared {
    /// Update status and notify subscribers on change (caller holds the lock)
    fn set_status_locked(&self, state: &mut ChannelState, status: ConnectionStatus) {
        if state.status != status {
            state.status = status;
            let _ = self.status_tx.send(status);
        }
    }

    /// Status update from a channel task; ignored once the task is stale
    fn set_status(&self, generation: u64, status: ConnectionStatus) {
        let mut state = self.state.lock();
        if state.generation == generation && !state.closed {
            self.set_status_locked(&mut state, status);
        }
    }

    fn on_connected(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.generation == generation && !state.closed {
            state.attempts = 0;
            self.set_status_locked(&mut state, ConnectionStatus::Connected);
        }
    }

    fn publish(&self, generation: u64, event: HudEvent) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.closed {
                return;
            }
            state.last_event_at = Some(Utc::now());
        }
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Offset to resume a regular file from, restarting at zero when the
    /// file was replaced or truncated. `None` once the task is stale.
    fn resume_offset(&self, generation: u64, identity: (u64, u64), len: u64) -> Option<u64> {
        let mut state = self.state.lock();
        if state.generation != generation || state.closed {
            return None;
        }
        if state.cursor.identity != Some(identity) || len < state.cursor.offset {
            if state.cursor.identity.is_some() {
                debug!(path = %state.path.display(), "Event channel: file replaced or truncated, rereading");
            }
            state.cursor = FileCursor {
                identity: Some(identity),
                offset: 0,
            };
        }
        Some(state.cursor.offset)
    }

    fn advance(&self, generation: u64, consumed: u64) {
        let mut state = self.state.lock();
        if state.generation == generation && !state.closed {
            state.cursor.offset += consumed;
        }
    }

    /// Claim the next reconnect attempt, or give up once the ceiling is hit
    fn next_reconnect(&self, generation: u64) -> Option<Duration> {
        let mut state = self.state.lock();
        if state.generation != generation || state.closed {
            return None;
        }
        if !self.backoff.allows(state.attempts) {
            info!(
                path = %state.path.display(),
                attempts = state.attempts,
                "Event channel: giving up after max reconnect attempts"
            );
            self.set_status_locked(&mut state, ConnectionStatus::Error);
            return None;
        }
        state.attempts += 1;
        Some(self.backoff.delay(state.attempts))
    }
}

/// Tails the hook event channel
///
/// Construct with [`EventReader::new`], subscribe, then [`EventReader::start`]
/// so no early status change or event is missed. [`EventReader::open`] does
/// both in one call for callers that subscribe later.
pub struct EventReader {
    shared: Arc<Shared>,
}

impl EventReader {
    /// Create a reader for `path` without starting it
    pub fn new(path: impl Into<PathBuf>, config: &ReconnectConfig) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ChannelState {
                    path: path.into(),
                    status: ConnectionStatus::Connecting,
                    attempts: 0,
                    last_event_at: None,
                    closed: false,
                    generation: 0,
                    cursor: FileCursor::default(),
                    task: None,
                }),
                status_tx,
                event_tx,
                backoff: Backoff::from_config(config),
                existence_poll: Duration::from_millis(config.existence_poll_ms.max(1)),
            }),
        }
    }

    /// Create and start a reader. Must be called within a Tokio runtime.
    pub fn open(path: impl Into<PathBuf>, config: &ReconnectConfig) -> Self {
        let reader = Self::new(path, config);
        reader.start();
        reader
    }

    /// Start consuming the channel. No-op while already running.
    ///
    /// After [`EventReader::close`] or after giving up, this reopens the same
    /// path with a fresh retry budget.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        let running = state.task.as_ref().is_some_and(|t| !t.is_finished());
        if running && !state.closed {
            return;
        }
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.closed = false;
        state.attempts = 0;
        self.spawn_locked(&mut state);
    }

    fn spawn_locked(&self, state: &mut ChannelState) {
        state.generation += 1;
        let generation = state.generation;
        let path = state.path.clone();
        let shared = Arc::clone(&self.shared);

        debug!(path = %path.display(), generation, "Event channel: starting reader task");
        state.task = Some(tokio::spawn(async move {
            run_channel(shared, path, generation).await;
        }));
    }

    /// Subscribe to connection status changes
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Subscribe to decoded events
    pub fn subscribe_events(&self) -> broadcast::Receiver<HudEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    /// Time the last valid event was received
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().last_event_at
    }

    /// Consecutive reconnect attempts since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.state.lock().attempts
    }

    pub fn path(&self) -> PathBuf {
        self.shared.state.lock().path.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Stop all activity. Idempotent; safe from any state.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.generation += 1;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        self.shared
            .set_status_locked(&mut state, ConnectionStatus::Disconnected);
    }

    /// Tear down the current channel and open `new_path` with a fresh retry budget
    pub fn switch_path(&self, new_path: impl Into<PathBuf>) {
        let mut state = self.shared.state.lock();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.path = new_path.into();
        state.cursor = FileCursor::default();
        state.attempts = 0;
        state.closed = false;
        self.shared
            .set_status_locked(&mut state, ConnectionStatus::Connecting);
        self.spawn_locked(&mut state);
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        if let Some(task) = self.shared.state.lock().task.take() {
            task.abort();
        }
    }
}

/// Channel task: wait, open, consume, back off, repeat
async fn run_channel(shared: Arc<Shared>, path: PathBuf, generation: u64) {
    loop {
        // A missing channel is not a failure, the producer just hasn't created it yet
        while !path.exists() {
            shared.set_status(generation, ConnectionStatus::Connecting);
            tokio::time::sleep(shared.existence_poll).await;
        }

        let outcome = match open_channel(&shared, generation, &path).await {
            Ok(Some(channel)) => {
                if !channel.tracks_offset {
                    shared.on_connected(generation);
                }
                consume(&shared, generation, channel).await
            }
            Ok(None) => {
                trace!(path = %path.display(), "Event channel: no new data");
                Ok(())
            }
            Err(e) => Err(e),
        };

        let status = match outcome {
            Ok(()) => {
                debug!(path = %path.display(), "Event channel: end of stream");
                ConnectionStatus::Disconnected
            }
            Err(e) => {
                debug!(path = %path.display(), "Event channel: stream error: {}", e);
                ConnectionStatus::Error
            }
        };
        shared.set_status(generation, status);

        let Some(delay) = shared.next_reconnect(generation) else {
            return;
        };
        trace!(?delay, "Event channel: reconnect scheduled");
        tokio::time::sleep(delay).await;
    }
}

/// Open the channel for reading.
///
/// A FIFO is opened read-write where supported: the reader then counts as a
/// writer itself, so the open never waits for a producer and the stream does
/// not hit end-of-data between producers.
///
/// A regular file is positioned at the cursor. `Ok(None)` means it holds
/// nothing past the cursor.
async fn open_channel(
    shared: &Shared,
    generation: u64,
    path: &Path,
) -> std::io::Result<Option<Channel>> {
    let metadata = tokio::fs::metadata(path).await?;

    if metadata.file_type().is_fifo() {
        let mut options = pipe::OpenOptions::new();
        #[cfg(any(target_os = "linux", target_os = "android"))]
        options.read_write(true);
        let receiver = options.open_receiver(path)?;
        return Ok(Some(Channel {
            stream: Box::new(receiver),
            tracks_offset: false,
        }));
    }

    let identity = (metadata.dev(), metadata.ino());
    let Some(offset) = shared.resume_offset(generation, identity, metadata.len()) else {
        return Ok(None);
    };
    if offset >= metadata.len() {
        return Ok(None);
    }

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(Some(Channel {
        stream: Box::new(file),
        tracks_offset: true,
    }))
}

/// Read records until end-of-data (`Ok`) or a read error (`Err`)
///
/// For regular files an unterminated last line is left for the next pass,
/// and the channel only counts as connected once a complete line arrives.
async fn consume(shared: &Shared, generation: u64, channel: Channel) -> std::io::Result<()> {
    let mut reader = BufReader::new(channel.stream);
    let mut line = Vec::new();
    let mut connected = !channel.tracks_offset;

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if channel.tracks_offset {
            if !line.ends_with(b"\n") {
                return Ok(());
            }
            shared.advance(generation, n as u64);
            if !connected {
                shared.on_connected(generation);
                connected = true;
            }
        }

        let record = line.trim_ascii();
        if record.is_empty() {
            continue;
        }

        match HudEvent::from_line(record) {
            Some(event) => shared.publish(generation, event),
            None => trace!(len = record.len(), "Event channel: dropped malformed record"),
        }
    }
}
