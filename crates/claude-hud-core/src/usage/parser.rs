//! Parse Claude Code `/usage` output.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::UsageData;

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%\s*used").unwrap());
static RESET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Resets?\s+(.+?)(?:\s*\(|$)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Session,
    Week,
}

/// Parse `/usage` output.
///
/// Expected format (each meter block):
/// ```text
///   Current session
///   ████████████████████████████████████               72% used
///   Resets 1am (Asia/Tokyo)
///
///   Current week (all models)
///   ███████████▌                                       23% used
///   Resets Mar 3, 12am (Asia/Tokyo)
/// ```
///
/// Only the first percent and the first reset line of each section count.
/// An `Extra usage` block ends the current section. Returns `None` when no
/// session data was found, even if weekly data was.
pub fn parse_usage_output(text: &str) -> Option<UsageData> {
    let mut section = Section::Outside;
    let mut session_percent = None;
    let mut session_reset = None;
    let mut week_percent = None;
    let mut week_reset = None;

    for line in text.lines() {
        if line.contains("Current session") {
            section = Section::Session;
            continue;
        }
        if line.contains("Current week") {
            section = Section::Week;
            continue;
        }
        if line.contains("Extra usage") {
            section = Section::Outside;
            continue;
        }

        let (percent, reset) = match section {
            Section::Outside => continue,
            Section::Session => (&mut session_percent, &mut session_reset),
            Section::Week => (&mut week_percent, &mut week_reset),
        };

        if percent.is_none() {
            *percent = extract_percent(line);
        }
        if reset.is_none() {
            *reset = extract_reset(line);
        }
    }

    let session_percent = session_percent.unwrap_or(0);
    let session_reset_time = session_reset.unwrap_or_default();
    if session_percent == 0 && session_reset_time.is_empty() {
        return None;
    }

    Some(UsageData {
        session_percent,
        session_reset_time,
        week_percent,
        week_reset_time: week_reset,
    })
}

/// Extract the percentage from a line containing "N% used"
fn extract_percent(line: &str) -> Option<u8> {
    PERCENT_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
}

/// Extract the reset text from a "Resets ..." line, without any trailing
/// parenthesized timezone
fn extract_reset(line: &str) -> Option<String> {
    let text = RESET_RE.captures(line.trim_end())?.get(1)?.as_str().trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_output() {
        let text = "Current session\nResets in 3 hours (approx)\n12% used\n\nCurrent week\n45% used\nResets in 2 days (approx)\n";

        let usage = parse_usage_output(text).unwrap();
        assert_eq!(
            usage,
            UsageData {
                session_percent: 12,
                session_reset_time: "in 3 hours".to_string(),
                week_percent: Some(45),
                week_reset_time: Some("in 2 days".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_usage_panel() {
        let text = r#"
 Settings:  Status   Config   Usage  (←/→ or tab to cycle)


  Current session
  ████████████████████████████████████               72% used
  Resets 1am (Asia/Tokyo)

  Current week (all models)
  ███████████▌                                       23% used
  Resets Mar 3, 12am (Asia/Tokyo)

  Current week (Sonnet only)
                                                     0% used

  Extra usage
  ██████████████████████▏                            44% used
  $22.22 / $50.00 spent · Resets Mar 1 (Asia/Tokyo)

  Esc to cancel
"#;

        let usage = parse_usage_output(text).unwrap();
        assert_eq!(usage.session_percent, 72);
        assert_eq!(usage.session_reset_time, "1am");
        // The first weekly meter wins
        assert_eq!(usage.week_percent, Some(23));
        assert_eq!(usage.week_reset_time.as_deref(), Some("Mar 3, 12am"));
    }

    #[test]
    fn test_week_only_is_absent() {
        let text = "Current week\n45% used\nResets in 2 days\n";
        assert_eq!(parse_usage_output(text), None);
    }

    #[test]
    fn test_unrecognized_output() {
        assert_eq!(parse_usage_output(""), None);
        assert_eq!(parse_usage_output("Error: not logged in"), None);
        // Percent lines outside any section are ignored
        assert_eq!(parse_usage_output("80% used\nResets soon"), None);
    }

    #[test]
    fn test_reset_without_percent() {
        let usage = parse_usage_output("Current session\nResets 5pm\n").unwrap();
        assert_eq!(usage.session_percent, 0);
        assert_eq!(usage.session_reset_time, "5pm");
        assert_eq!(usage.week_percent, None);
    }

    #[test]
    fn test_extract_percent() {
        assert_eq!(extract_percent("████   72% used"), Some(72));
        assert_eq!(extract_percent("100%used"), Some(100));
        assert_eq!(extract_percent("72 % used"), None);
        assert_eq!(extract_percent("999% used"), None);
    }

    #[test]
    fn test_extract_reset() {
        assert_eq!(extract_reset("  Resets 1am (Asia/Tokyo)").as_deref(), Some("1am"));
        assert_eq!(extract_reset("Reset tomorrow").as_deref(), Some("tomorrow"));
        assert_eq!(extract_reset("Resets in 2 days\r").as_deref(), Some("in 2 days"));
        assert_eq!(extract_reset("no reset here"), None);
    }
}
