//! Usage data parsed from Claude Code `/usage` output.

use serde::Serialize;

/// Session and weekly quota usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageData {
    /// Percentage of the current session quota used (0-100)
    pub session_percent: u8,
    /// When the session quota resets (e.g., "in 3 hours"), empty if unknown
    pub session_reset_time: String,
    /// Percentage of the weekly quota used
    pub week_percent: Option<u8>,
    /// When the weekly quota resets
    pub week_reset_time: Option<String>,
}
