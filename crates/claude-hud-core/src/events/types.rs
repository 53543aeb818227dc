//! Event channel data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Connection status of the event channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Waiting for the channel to appear or open
    #[default]
    Connecting,
    /// Channel open and being consumed
    Connected,
    /// Stream ended, or the reader was closed
    Disconnected,
    /// Stream failed, or reconnect attempts were exhausted
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook event kinds emitted by Claude Code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HudEventKind {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    Stop,
    SubagentStop,
    Notification,
    PreCompact,
    SessionStart,
    SessionEnd,
}

/// One decoded line of the event channel
///
/// `event` and `session` are required; a line without them (or with an
/// unknown kind) does not decode and is dropped by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HudEvent {
    /// Hook kind
    pub event: HudEventKind,
    /// Session identifier
    pub session: String,
    /// Unix timestamp in (fractional) seconds
    #[serde(default)]
    pub ts: f64,
    /// Tool name (tool events)
    #[serde(default)]
    pub tool: Option<String>,
    /// Tool input (tool events)
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    /// Tool response (PostToolUse)
    #[serde(default)]
    pub response: Option<serde_json::Value>,
    /// Prompt text (UserPromptSubmit)
    #[serde(default)]
    pub prompt: Option<String>,
    /// Transcript of the emitting session, when the hook forwards it
    #[serde(default)]
    pub transcript_path: Option<String>,
    /// Working directory of the emitting session
    #[serde(default)]
    pub cwd: Option<String>,
}

impl HudEvent {
    /// Decode one channel line; `None` for anything that is not a valid event
    pub fn from_line(line: &[u8]) -> Option<Self> {
        serde_json::from_slice(line).ok()
    }

    /// Event timestamp, if `ts` is set
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.ts <= 0.0 || !self.ts.is_finite() {
            return None;
        }
        let secs = self.ts.trunc() as i64;
        let nanos = ((self.ts - self.ts.trunc()) * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Transcript path carried by the event, if any
    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(Path::new)
    }

    /// Whether this is a tool event
    pub fn is_tool_event(&self) -> bool {
        matches!(self.event, HudEventKind::PreToolUse | HudEventKind::PostToolUse)
    }
}
