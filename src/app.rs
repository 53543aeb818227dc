use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use claude_hud_core::{HudConfig, HudOrchestrator, RenderSnapshot};

use crate::config::Config;
use crate::context_files::LocalContext;
use crate::render::session_line;

/// Extra time a one-shot render gives the usage process beyond its own limit
const ONCE_USAGE_GRACE: Duration = Duration::from_millis(500);

/// Main application: drives the orchestrator and writes the status line
pub struct App {
    settings: HudConfig,
    transcript: Option<PathBuf>,
    once: bool,
}

impl App {
    pub fn new(settings: HudConfig, cli: &Config) -> Self {
        Self {
            settings,
            transcript: cli.transcript.clone(),
            once: cli.once,
        }
    }

    fn orchestrator(&self) -> HudOrchestrator {
        let orchestrator = HudOrchestrator::from_config(&self.settings);
        if let Some(path) = &self.transcript {
            orchestrator.set_transcript_path(path.clone());
        }
        orchestrator
    }

    /// Compose one snapshot and render it
    pub async fn render_once(&self) -> String {
        let usage_wait = Duration::from_millis(self.settings.usage.timeout_ms) + ONCE_USAGE_GRACE;
        let snapshot = self.orchestrator().compose_once(usage_wait).await;
        render_line(&snapshot)
    }

    /// Run until interrupted, or print a single line with `--once`
    pub async fn run(self) -> Result<()> {
        if self.once {
            println!("{}", self.render_once().await);
            return Ok(());
        }

        let orchestrator = self.orchestrator();
        let mut snapshots = orchestrator.start();
        let mut stdout = std::io::stdout();
        let mut last_line = String::new();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        debug!("Snapshot channel closed");
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    let line = render_line(&snapshot);
                    if line != last_line {
                        write!(stdout, "\r\x1b[2K{}", line)?;
                        stdout.flush()?;
                        last_line = line;
                    }
                }
                _ = &mut shutdown => {
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        orchestrator.shutdown();
        writeln!(stdout)?;
        Ok(())
    }
}

/// Render a snapshot with the local files for its working directory
pub fn render_line(snapshot: &RenderSnapshot) -> String {
    let cwd = snapshot
        .cwd
        .clone()
        .or_else(|| std::env::current_dir().ok());
    session_line(snapshot, &LocalContext::gather(cwd.as_deref()))
}
