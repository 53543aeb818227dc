use anyhow::Result;

use claude_hud::config::Config;
use claude_hud::App;
use claude_hud_core::{logging, HudConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Config::parse_args();

    // Load settings
    let mut settings = HudConfig::load(cli.config.as_deref())?;
    cli.merge_into(&mut settings);

    // Setup logging; stdout is the status line, so failures stay silent
    let logging = logging::init(&settings.logging).ok();

    // Run the application
    let app = App::new(settings, &cli);
    let result = app.run().await;

    if let Some(handle) = logging {
        handle.close();
    }
    result
}
