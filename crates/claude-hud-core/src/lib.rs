//! # claude-hud-core
//!
//! Live aggregation layer behind the claude-hud status line.
//!
//! Four independent sources feed one render-ready snapshot:
//! - [`events::EventReader`] tails the hook event FIFO and reconnects with backoff
//! - [`transcript::TranscriptReader`] aggregates token usage from the session transcript
//! - [`usage::UsageReader`] shells out for account quota usage (rate limited, single flight)
//! - [`settings::SettingsReader`] reads the assistant settings file with a TTL
//!
//! [`orchestrator::HudOrchestrator`] composes them into an immutable
//! [`orchestrator::RenderSnapshot`]. Every source is optional; a failing
//! source only ever shows up as missing data or a connection status.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod settings;
pub mod transcript;
pub mod usage;

pub use config::HudConfig;
pub use error::{Error, Result};
pub use events::{ConnectionStatus, EventReader, HudEvent, HudEventKind};
pub use orchestrator::{HudOrchestrator, RenderSnapshot};
pub use settings::{SettingsReader, SettingsSnapshot};
pub use transcript::{ContextHealth, HealthStatus, ModelCapacities, TranscriptReader, TranscriptSnapshot};
pub use usage::{UsageData, UsageReader};
