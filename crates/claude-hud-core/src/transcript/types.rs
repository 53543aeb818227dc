//! Transcript aggregate types.

use serde::Serialize;
use std::collections::HashMap;

use crate::config::HudConfig;

/// Context window size for models that are not in the table
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Context window size for the extended-context variants (`...[1m]`)
pub const EXTENDED_CONTEXT_WINDOW: u64 = 1_000_000;

/// Percent at which the status turns to warning
pub const WARNING_PERCENT: u32 = 70;

/// Percent at which the status turns critical and compaction is suggested
pub const CRITICAL_PERCENT: u32 = 85;

/// Token totals over all assistant turns of a transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscriptSnapshot {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    /// Always the sum of the four counters above
    pub total_tokens: u64,
    /// Assistant turns carrying usage data
    pub message_count: u64,
    /// Model of the most recent assistant turn with usage
    pub model: Option<String>,
}

impl TranscriptSnapshot {
    pub fn new(
        input_tokens: u64,
        output_tokens: u64,
        cache_creation_tokens: u64,
        cache_read_tokens: u64,
        message_count: u64,
        model: Option<String>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            total_tokens: input_tokens
                .saturating_add(output_tokens)
                .saturating_add(cache_creation_tokens)
                .saturating_add(cache_read_tokens),
            message_count,
            model,
        }
    }
}

/// Context usage tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn from_percent(percent: u32) -> Self {
        if percent >= CRITICAL_PERCENT {
            HealthStatus::Critical
        } else if percent >= WARNING_PERCENT {
            HealthStatus::Warning
        } else {
            HealthStatus::Ok
        }
    }
}

/// How full the context window is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextHealth {
    /// Rounded percentage of the window in use
    pub percent: u32,
    pub status: HealthStatus,
    pub should_compact: bool,
    /// Tokens left before the window is full (never negative)
    pub remaining: u64,
    /// Window size the percentage was computed against
    pub capacity: u64,
}

impl ContextHealth {
    pub fn from_tokens(total_tokens: u64, capacity: u64) -> Self {
        let capacity = capacity.max(1);
        let percent = (100.0 * total_tokens as f64 / capacity as f64).round() as u32;

        Self {
            percent,
            status: HealthStatus::from_percent(percent),
            should_compact: percent >= CRITICAL_PERCENT,
            remaining: capacity.saturating_sub(total_tokens),
            capacity,
        }
    }

    pub fn for_snapshot(snapshot: &TranscriptSnapshot, capacities: &ModelCapacities) -> Self {
        Self::from_tokens(
            snapshot.total_tokens,
            capacities.capacity_for(snapshot.model.as_deref()),
        )
    }
}

/// Context window size per model
///
/// Lookup order: exact id, longest matching prefix, the `[1m]` marker for
/// extended-context variants, then the default.
#[derive(Debug, Clone)]
pub struct ModelCapacities {
    entries: HashMap<String, u64>,
    default_capacity: u64,
}

impl ModelCapacities {
    pub fn new(default_capacity: u64) -> Self {
        Self {
            entries: HashMap::new(),
            default_capacity,
        }
    }

    pub fn from_config(config: &HudConfig) -> Self {
        let mut capacities = Self::new(config.default_capacity);
        for (model, capacity) in &config.model_capacities {
            capacities.insert(model, *capacity);
        }
        capacities
    }

    pub fn insert(&mut self, model: &str, capacity: u64) {
        self.entries.insert(model.to_ascii_lowercase(), capacity);
    }

    pub fn with(mut self, model: &str, capacity: u64) -> Self {
        self.insert(model, capacity);
        self
    }

    pub fn default_capacity(&self) -> u64 {
        self.default_capacity
    }

    pub fn capacity_for(&self, model: Option<&str>) -> u64 {
        let Some(model) = model else {
            return self.default_capacity;
        };
        let model = model.to_ascii_lowercase();

        if let Some(capacity) = self.entries.get(&model) {
            return *capacity;
        }

        let prefix_match = self
            .entries
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        if let Some((_, capacity)) = prefix_match {
            return *capacity;
        }

        if model.ends_with("[1m]") {
            return EXTENDED_CONTEXT_WINDOW;
        }

        self.default_capacity
    }
}

impl Default for ModelCapacities {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_WINDOW)
    }
}
