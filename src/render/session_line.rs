use claude_hud_core::{ConnectionStatus, RenderSnapshot, UsageData};
use std::collections::BTreeSet;
use unicode_width::UnicodeWidthChar;

use crate::context_files::LocalContext;

use super::colors::{colored_bar, cyan, dim, percent_color, red, yellow, RESET};

const BAR_WIDTH: usize = 10;
const TOOL_WIDTH: usize = 24;

/// Render one status line
///
/// `[model] ██████░░░░ 60% | 📋 3 rules | 🔌 2 MCPs | ⏱️ 12m | ⏳ 12% (5pm) · wk 45% | 🔧 Edit`
pub fn session_line(snapshot: &RenderSnapshot, local: &LocalContext) -> String {
    let model = snapshot.model().unwrap_or("unknown");
    let health = snapshot.context_health.as_ref();
    let percent = health.map(|h| h.percent).unwrap_or(0);

    let mut parts = vec![format!(
        "{} {} {}{}%{}",
        cyan(&format!("[{}]", model)),
        colored_bar(percent, BAR_WIDTH),
        percent_color(percent),
        percent,
        RESET
    )];

    if local.rules_count > 0 {
        parts.push(dim(&format!("📋 {} rules", local.rules_count)));
    }

    let mcp_count = distinct_mcp_servers(snapshot, local);
    if mcp_count > 0 {
        parts.push(dim(&format!("🔌 {} MCPs", mcp_count)));
    }

    parts.push(dim(&format!("⏱️ {}", snapshot.elapsed)));

    if let Some(usage) = snapshot.usage.as_deref() {
        parts.push(usage_segment(usage));
    }

    if let Some(tool) = snapshot.last_event.as_ref().and_then(|e| e.tool.as_deref()) {
        parts.push(dim(&format!("🔧 {}", truncate_to_width(tool, TOOL_WIDTH))));
    }

    match snapshot.status {
        ConnectionStatus::Connected => {}
        ConnectionStatus::Connecting => parts.push(dim("◌ connecting")),
        ConnectionStatus::Disconnected => parts.push(yellow("○ disconnected")),
        ConnectionStatus::Error => parts.push(red("✕ offline")),
    }

    let mut line = parts.join(" | ");

    if let (Some(health), Some(transcript)) = (health, snapshot.transcript.as_deref()) {
        if percent >= 85 {
            line.push_str(&dim(&format!(
                " (in: {}, cache: {}, left: {})",
                format_tokens(transcript.input_tokens),
                format_tokens(transcript.cache_creation_tokens + transcript.cache_read_tokens),
                format_tokens(health.remaining)
            )));
        }
        if health.should_compact {
            line.push(' ');
            line.push_str(&red("⚠️ COMPACT"));
        }
    }

    line
}

/// Distinct MCP servers across `settings.json` and `.mcp.json`
fn distinct_mcp_servers(snapshot: &RenderSnapshot, local: &LocalContext) -> usize {
    let from_settings = snapshot.settings.iter().flat_map(|s| s.mcp_names.iter());
    from_settings
        .chain(local.mcp_servers.iter())
        .collect::<BTreeSet<_>>()
        .len()
}

fn usage_segment(usage: &UsageData) -> String {
    let session = u32::from(usage.session_percent);
    let mut segment = format!("⏳ {}{}%{}", percent_color(session), session, RESET);
    if !usage.session_reset_time.is_empty() {
        segment.push_str(&dim(&format!(" ({})", usage.session_reset_time)));
    }
    if let Some(week) = usage.week_percent.map(u32::from) {
        segment.push_str(&format!(" · wk {}{}%{}", percent_color(week), week, RESET));
    }
    segment
}

/// `1.2M`, `45k` or the plain number below a thousand
pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1000 {
        format!("{:.0}k", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

/// Display width of `text`, ignoring ANSI escape sequences
pub fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC [ params final-byte
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) && c != '[' {
                    break;
                }
            }
            continue;
        }
        width += c.width().unwrap_or(0);
    }
    width
}

/// Cut plain `text` to at most `max` columns, marking the cut with `…`
pub fn truncate_to_width(text: &str, max: usize) -> String {
    if visible_width(text) <= max {
        return text.to_string();
    }

    let mut out = String::new();
    let mut width = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push('…');
    out
}
