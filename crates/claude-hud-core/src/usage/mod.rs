//! Account quota usage: run Claude Code's `/usage` command and parse it.
//!
//! The command is slow and rate limited upstream, so [`UsageReader`] keeps
//! the last good result for a minimum interval and never runs two fetches
//! at once.

pub mod fetcher;
pub mod parser;
pub mod reader;
pub mod types;

pub use fetcher::{ProcessUsageSource, UsageSource};
pub use parser::parse_usage_output;
pub use reader::UsageReader;
pub use types::UsageData;
