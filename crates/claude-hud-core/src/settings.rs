//! Claude Code settings reader
//!
//! Reads `~/.claude/settings.json` for the model, enabled plugins, MCP
//! servers and allowed permissions. The parsed result is kept for a TTL;
//! a missing or invalid file is never cached, so it is retried on the next
//! read.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::Memo;
use crate::config::HudConfig;
use crate::error::{Error, Result};

/// Model shown when the settings file does not name one
pub const UNKNOWN_MODEL: &str = "unknown";

/// The parts of the settings file the HUD displays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SettingsSnapshot {
    pub model: String,
    /// Enabled plugins, without the `@marketplace` suffix
    pub plugin_names: Vec<String>,
    pub mcp_names: Vec<String>,
    /// `permissions.allow`, verbatim
    pub allowed_permissions: Vec<String>,
}

impl SettingsSnapshot {
    pub fn plugin_count(&self) -> usize {
        self.plugin_names.len()
    }

    pub fn mcp_count(&self) -> usize {
        self.mcp_names.len()
    }
}

/// Claude Code settings (only fields we care about)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    model: Option<String>,
    enabled_plugins: Option<BTreeMap<String, serde_json::Value>>,
    mcp_servers: Option<BTreeMap<String, serde_json::Value>>,
    permissions: Option<RawPermissions>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPermissions {
    #[serde(default)]
    allow: Vec<String>,
}

impl From<RawSettings> for SettingsSnapshot {
    fn from(raw: RawSettings) -> Self {
        let plugin_names = raw
            .enabled_plugins
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, enabled)| enabled.as_bool() == Some(true))
            .map(|(name, _)| match name.split_once('@') {
                Some((base, _)) => base.to_string(),
                None => name,
            })
            .collect();

        Self {
            model: raw
                .model
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
            plugin_names,
            mcp_names: raw.mcp_servers.unwrap_or_default().into_keys().collect(),
            allowed_permissions: raw.permissions.map(|p| p.allow).unwrap_or_default(),
        }
    }
}

/// Read and parse a settings file
pub fn load_settings_file(path: &Path) -> Result<SettingsSnapshot> {
    let content = std::fs::read_to_string(path)?;
    let raw: RawSettings = serde_json::from_str(&content)?;
    Ok(raw.into())
}

/// Like [`load_settings_file`], collapsing any failure to `None`
pub fn read_settings_file(path: &Path) -> Option<SettingsSnapshot> {
    match load_settings_file(path) {
        Ok(snapshot) => Some(snapshot),
        Err(Error::Io(e)) => {
            tracing::trace!("Settings file {:?} not readable: {}", path, e);
            None
        }
        Err(e) => {
            tracing::debug!("Failed to load settings file {:?}: {}", path, e);
            None
        }
    }
}

/// TTL cache over the settings file
pub struct SettingsReader {
    path: PathBuf,
    ttl: Duration,
    memo: Memo<SettingsSnapshot, Instant>,
}

impl SettingsReader {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            memo: Memo::new(),
        }
    }

    pub fn from_config(config: &HudConfig) -> Self {
        Self::new(config.settings_path.clone(), config.settings_ttl())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached settings while younger than the TTL, otherwise re-read
    pub fn read(&self) -> Option<Arc<SettingsSnapshot>> {
        if let Some(hit) = self.memo.fresh(|at| at.elapsed() < self.ttl) {
            return Some(hit);
        }
        self.force_refresh()
    }

    /// Re-read the file regardless of the TTL
    pub fn force_refresh(&self) -> Option<Arc<SettingsSnapshot>> {
        match read_settings_file(&self.path) {
            Some(snapshot) => Some(self.memo.store(snapshot, Instant::now())),
            None => {
                self.memo.invalidate();
                None
            }
        }
    }
}
