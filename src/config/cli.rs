use clap::Parser;
use std::path::PathBuf;

use claude_hud_core::HudConfig;

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Live status line for Claude Code sessions")]
pub struct Config {
    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Event FIFO written by the hook
    #[arg(short, long)]
    pub fifo: Option<PathBuf>,

    /// Transcript file to follow until an event names another one
    #[arg(short, long)]
    pub transcript: Option<PathBuf>,

    /// Print a single status line and exit
    #[arg(long)]
    pub once: bool,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command line overrides on top of the config file
    pub fn merge_into(&self, settings: &mut HudConfig) {
        if self.debug {
            settings.logging.level = "debug".to_string();
        }
        if let Some(fifo) = &self.fifo {
            settings.event_channel = fifo.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_flags() {
        let cli = Config::parse_from([
            "claude-hud",
            "--debug",
            "--fifo",
            "/tmp/events.fifo",
            "--transcript",
            "/tmp/t.jsonl",
            "--once",
        ]);
        assert!(cli.debug);
        assert!(cli.once);
        assert_eq!(cli.fifo, Some(PathBuf::from("/tmp/events.fifo")));
        assert_eq!(cli.transcript, Some(PathBuf::from("/tmp/t.jsonl")));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_merge_overrides() {
        let cli = Config::parse_from(["claude-hud", "-d", "-f", "/tmp/other.fifo"]);
        let mut settings = HudConfig::default();
        cli.merge_into(&mut settings);

        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.event_channel, PathBuf::from("/tmp/other.fifo"));
    }

    #[test]
    fn test_no_flags_keeps_settings() {
        let cli = Config::parse_from(["claude-hud"]);
        let mut settings = HudConfig::default();
        let before = settings.event_channel.clone();
        cli.merge_into(&mut settings);

        assert_eq!(settings.event_channel, before);
        assert_eq!(settings.logging.level, "warn");
    }
}
