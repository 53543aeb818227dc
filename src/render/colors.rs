//! ANSI color helpers

pub const RESET: &str = "\x1b[0m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

fn paint(color: &str, text: &str) -> String {
    format!("{}{}{}", color, text, RESET)
}

pub fn yellow(text: &str) -> String {
    paint(YELLOW, text)
}

pub fn red(text: &str) -> String {
    paint(RED, text)
}

pub fn cyan(text: &str) -> String {
    paint(CYAN, text)
}

pub fn dim(text: &str) -> String {
    paint(DIM, text)
}

/// Color for a usage percentage: green below 70, yellow below 85, red above
pub fn percent_color(percent: u32) -> &'static str {
    if percent >= 85 {
        RED
    } else if percent >= 70 {
        YELLOW
    } else {
        GREEN
    }
}

/// `width` cells, filled in proportion to `percent` (clamped to 100)
pub fn colored_bar(percent: u32, width: usize) -> String {
    let filled = ((percent.min(100) as f64 / 100.0) * width as f64).round() as usize;
    format!(
        "{}{}{}{}{}",
        percent_color(percent),
        "█".repeat(filled),
        DIM,
        "░".repeat(width - filled),
        RESET
    )
}
