//! Terminal rendering of a [`RenderSnapshot`](claude_hud_core::RenderSnapshot)
//! into one ANSI-colored status line.

pub mod colors;
mod session_line;

pub use session_line::{format_tokens, session_line, truncate_to_width, visible_width};
