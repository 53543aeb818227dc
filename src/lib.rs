//! claude-hud: a live status line for Claude Code sessions.
//!
//! The aggregation lives in `claude-hud-core`; this crate adds the command
//! line, local rule and MCP file discovery and terminal rendering.

pub mod app;
pub mod config;
pub mod context_files;
pub mod render;

pub use app::App;
