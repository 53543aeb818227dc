//! Transcript aggregation: token totals and context-window health.
//!
//! Claude Code appends one JSON object per line to the session transcript.
//! [`TranscriptReader`] keeps running totals per transcript path and only
//! parses bytes it has not seen before; [`ContextHealth`] turns the totals
//! into a percentage of the model's context window.

pub mod reader;
pub mod types;

pub use reader::{FileSignature, TranscriptReader};
pub use types::{ContextHealth, HealthStatus, ModelCapacities, TranscriptSnapshot};
