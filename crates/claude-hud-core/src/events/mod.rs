//! Event channel: tail hook events from a local FIFO.
//!
//! The hook process writes one JSON object per line into a named pipe. The
//! [`EventReader`] waits for the pipe to appear, tails it, and reconnects
//! with exponential backoff when the stream ends or fails. Consumers get two
//! independent subscriptions: connection status changes and decoded events.

pub mod backoff;
pub mod reader;
pub mod types;

pub use backoff::Backoff;
pub use reader::EventReader;
pub use types::{ConnectionStatus, HudEvent, HudEventKind};
