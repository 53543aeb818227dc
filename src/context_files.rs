//! Local files Claude Code loads for a session: rule files and the
//! user-level `.mcp.json`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use claude_hud_core::config::claude_dir;

/// Per-render facts read from disk rather than from the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalContext {
    pub rules_count: usize,
    /// MCP servers declared in `~/.claude/.mcp.json`
    pub mcp_servers: Vec<String>,
}

impl LocalContext {
    pub fn gather(cwd: Option<&Path>) -> Self {
        Self::gather_in(&claude_dir(), cwd)
    }

    /// Like [`LocalContext::gather`] with an explicit user-level `.claude` directory
    pub fn gather_in(user_dir: &Path, cwd: Option<&Path>) -> Self {
        Self {
            rules_count: count_rules_in(user_dir, cwd),
            mcp_servers: mcp_server_names_in(user_dir),
        }
    }
}

/// Rule files that apply in `cwd`: the user's `CLAUDE.md` and
/// `rules/*.md` under `user_dir`, plus the project's `CLAUDE.md` and
/// `.claude/rules/*.md`
pub fn count_rules_in(user_dir: &Path, cwd: Option<&Path>) -> usize {
    let mut count = usize::from(user_dir.join("CLAUDE.md").is_file());
    count += count_markdown(&user_dir.join("rules"));

    if let Some(cwd) = cwd {
        count += usize::from(cwd.join("CLAUDE.md").is_file());
        count += count_markdown(&cwd.join(".claude").join("rules"));
    }

    count
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct McpFile {
    mcp_servers: Option<BTreeMap<String, serde_json::Value>>,
}

/// Server names from `<user_dir>/.mcp.json`; empty when missing or invalid
pub fn mcp_server_names_in(user_dir: &Path) -> Vec<String> {
    let path = user_dir.join(".mcp.json");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            tracing::trace!("Skipping MCP file {:?}: {}", path, e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<McpFile>(&content) {
        Ok(file) => file.mcp_servers.unwrap_or_default().into_keys().collect(),
        Err(e) => {
            tracing::debug!("Failed to parse MCP file {:?}: {}", path, e);
            Vec::new()
        }
    }
}

fn count_markdown(dir: &Path) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::trace!("Skipping rules dir {:?}: {}", dir, e);
            return 0;
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "md"))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_counts_user_and_project_rules() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();

        fs::write(home.path().join("CLAUDE.md"), "# user").unwrap();
        fs::create_dir_all(home.path().join("rules")).unwrap();
        fs::write(home.path().join("rules/style.md"), "").unwrap();
        fs::write(home.path().join("rules/notes.txt"), "").unwrap();

        fs::write(project.path().join("CLAUDE.md"), "# project").unwrap();
        fs::create_dir_all(project.path().join(".claude/rules")).unwrap();
        fs::write(project.path().join(".claude/rules/a.md"), "").unwrap();
        fs::write(project.path().join(".claude/rules/b.md"), "").unwrap();

        assert_eq!(count_rules_in(home.path(), None), 2);
        assert_eq!(count_rules_in(home.path(), Some(project.path())), 5);
    }

    #[test]
    fn test_nothing_present() {
        let home = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        assert_eq!(count_rules_in(home.path(), Some(project.path())), 0);
        assert_eq!(count_rules_in(&home.path().join("missing"), None), 0);
    }

    #[test]
    fn test_mcp_servers_from_user_file() {
        let home = tempfile::tempdir().unwrap();
        assert!(mcp_server_names_in(home.path()).is_empty());

        fs::write(
            home.path().join(".mcp.json"),
            r#"{"mcpServers": {"linear": {"command": "npx"}, "fs": {}}}"#,
        )
        .unwrap();
        assert_eq!(mcp_server_names_in(home.path()), vec!["fs", "linear"]);

        fs::write(home.path().join(".mcp.json"), "{ broken").unwrap();
        assert!(mcp_server_names_in(home.path()).is_empty());
    }

    #[test]
    fn test_gather_collects_both() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join("CLAUDE.md"), "").unwrap();
        fs::write(home.path().join(".mcp.json"), r#"{"mcpServers": {"fs": {}}}"#).unwrap();

        let local = LocalContext::gather_in(home.path(), None);
        assert_eq!(
            local,
            LocalContext {
                rules_count: 1,
                mcp_servers: vec!["fs".to_string()],
            }
        );
    }
}
