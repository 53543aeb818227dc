//! Incremental transcript reader
//!
//! Each transcript path keeps a checkpoint: the byte offset up to which
//! complete lines have been folded into the running totals. A refresh seeks
//! to the checkpoint and parses only the bytes appended since, so the result
//! always matches a full scan of the file. A trailing line without a newline
//! is counted for the current snapshot but not committed, because the writer
//! may still be in the middle of it. A file that shrank, or was replaced by
//! another file at the same path, is rescanned from the start.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::types::{ContextHealth, ModelCapacities, TranscriptSnapshot};
use crate::cache::Memo;

/// Identity of a transcript file's contents as seen by the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    /// `(device, inode)`; changes when the path points at another file
    pub identity: (u64, u64),
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileSignature {
    pub fn of(metadata: &Metadata) -> Self {
        Self {
            identity: (metadata.dev(), metadata.ino()),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    entry_type: Option<String>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    model: Option<String>,
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
}

#[derive(Debug, Clone, Default)]
struct Totals {
    input: u64,
    output: u64,
    cache_creation: u64,
    cache_read: u64,
    messages: u64,
    model: Option<String>,
}

impl Totals {
    /// Fold one transcript line in. Lines that are not assistant turns with
    /// usage data, or are not valid JSON, leave the totals untouched.
    fn absorb(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        let entry: RawEntry = match serde_json::from_slice(line) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::trace!("Skipping malformed transcript line: {}", e);
                return;
            }
        };

        if entry.entry_type.as_deref() != Some("assistant") {
            return;
        }
        let Some(message) = entry.message else {
            return;
        };
        let Some(usage) = message.usage else {
            return;
        };

        self.input = self.input.saturating_add(usage.input_tokens);
        self.output = self.output.saturating_add(usage.output_tokens);
        self.cache_creation = self
            .cache_creation
            .saturating_add(usage.cache_creation_input_tokens);
        self.cache_read = self.cache_read.saturating_add(usage.cache_read_input_tokens);
        self.messages += 1;
        if message.model.is_some() {
            self.model = message.model;
        }
    }

    fn merged(&self, tail: &Totals) -> Totals {
        Totals {
            input: self.input.saturating_add(tail.input),
            output: self.output.saturating_add(tail.output),
            cache_creation: self.cache_creation.saturating_add(tail.cache_creation),
            cache_read: self.cache_read.saturating_add(tail.cache_read),
            messages: self.messages + tail.messages,
            model: tail.model.clone().or_else(|| self.model.clone()),
        }
    }

    fn snapshot(self) -> TranscriptSnapshot {
        TranscriptSnapshot::new(
            self.input,
            self.output,
            self.cache_creation,
            self.cache_read,
            self.messages,
            self.model,
        )
    }
}

#[derive(Default)]
struct Checkpoint {
    identity: Option<(u64, u64)>,
    offset: u64,
    committed: Totals,
}

#[derive(Default)]
struct PathEntry {
    memo: Memo<TranscriptSnapshot, FileSignature>,
    checkpoint: Checkpoint,
}

impl PathEntry {
    fn refresh(&mut self, path: &Path, signature: &FileSignature) -> io::Result<TranscriptSnapshot> {
        let replaced = self.checkpoint.identity != Some(signature.identity);
        if replaced || signature.len < self.checkpoint.offset {
            if self.checkpoint.identity.is_some() {
                tracing::debug!(path = %path.display(), "Transcript replaced or truncated, rescanning");
            }
            self.checkpoint = Checkpoint {
                identity: Some(signature.identity),
                ..Checkpoint::default()
            };
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(self.checkpoint.offset))?;
        let mut reader = BufReader::new(file);

        let mut tail = Totals::default();
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n == 0 {
                break;
            }
            if line.ends_with(b"\n") {
                self.checkpoint.committed.absorb(&line);
                self.checkpoint.offset += n as u64;
            } else {
                tail.absorb(&line);
            }
        }

        Ok(self.checkpoint.committed.merged(&tail).snapshot())
    }
}

/// Aggregates transcript files, memoized on their file signature
#[derive(Default)]
pub struct TranscriptReader {
    entries: Mutex<HashMap<PathBuf, PathEntry>>,
}

impl TranscriptReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token totals of the transcript at `path`.
    ///
    /// Returns the cached instance while the file's size and modification
    /// time are unchanged. A missing or unreadable file yields `None`.
    pub fn read(&self, path: &Path) -> Option<Arc<TranscriptSnapshot>> {
        let mut entries = self.entries.lock();

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => {
                entries.remove(path);
                return None;
            }
        };
        let signature = FileSignature::of(&metadata);

        let entry = entries.entry(path.to_path_buf()).or_default();
        if let Some(hit) = entry.memo.fresh(|seen| *seen == signature) {
            return Some(hit);
        }

        match entry.refresh(path, &signature) {
            Ok(snapshot) => Some(entry.memo.store(snapshot, signature)),
            Err(e) => {
                tracing::debug!(path = %path.display(), "Failed to read transcript: {}", e);
                entries.remove(path);
                None
            }
        }
    }

    /// Context window usage of the transcript at `path`
    pub fn context_health(
        &self,
        path: &Path,
        capacities: &ModelCapacities,
    ) -> Option<ContextHealth> {
        self.read(path)
            .map(|snapshot| ContextHealth::for_snapshot(&snapshot, capacities))
    }

    /// Forget the checkpoint and cached snapshot for `path`
    pub fn forget(&self, path: &Path) {
        self.entries.lock().remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::types::HealthStatus;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FIXTURE: &str = concat!(
        r#"{"type":"user","message":{"content":"hi"}}"#,
        "\n",
        r#"{"type":"assistant","message":{"model":"claude-sonnet-4","usage":{"input_tokens":100,"output_tokens":50,"cache_creation_input_tokens":20,"cache_read_input_tokens":5}}}"#,
        "\n",
        r#"{"type":"assistant","message":{"usage":{"input_tokens":10,"output_tokens":5,"cache_creation_input_tokens":7,"cache_read_input_tokens":2}}}"#,
        "\n",
        "not json",
    );

    fn write_file(path: &Path, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    fn append(path: &Path, content: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn assistant_line(input: u64, output: u64, model: &str) -> String {
        format!(
            r#"{{"type":"assistant","message":{{"model":"{}","usage":{{"input_tokens":{},"output_tokens":{}}}}}}}"#,
            model, input, output
        ) + "\n"
    }

    #[test]
    fn test_sums_assistant_usage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, FIXTURE);

        let reader = TranscriptReader::new();
        let snapshot = reader.read(&path).unwrap();

        assert_eq!(snapshot.input_tokens, 110);
        assert_eq!(snapshot.output_tokens, 55);
        assert_eq!(snapshot.cache_creation_tokens, 27);
        assert_eq!(snapshot.cache_read_tokens, 7);
        assert_eq!(snapshot.total_tokens, 199);
        assert_eq!(snapshot.message_count, 2);
        assert_eq!(snapshot.model.as_deref(), Some("claude-sonnet-4"));
    }

    #[test]
    fn test_unchanged_file_returns_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, FIXTURE);

        let reader = TranscriptReader::new();
        let first = reader.read(&path).unwrap();
        let second = reader.read(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = TranscriptReader::new();
        assert!(reader.read(&dir.path().join("missing.jsonl")).is_none());
        assert!(reader
            .context_health(&dir.path().join("missing.jsonl"), &ModelCapacities::default())
            .is_none());
    }

    #[test]
    fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, "");

        let snapshot = TranscriptReader::new().read(&path).unwrap();
        assert_eq!(*snapshot, TranscriptSnapshot::default());
    }

    #[test]
    fn test_appended_lines_match_full_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, &assistant_line(100, 10, "claude-opus-4"));

        let reader = TranscriptReader::new();
        assert_eq!(reader.read(&path).unwrap().total_tokens, 110);

        append(&path, &assistant_line(200, 20, "claude-opus-4"));
        append(&path, "garbage\n");
        append(&path, &assistant_line(300, 30, "claude-sonnet-4"));

        let incremental = reader.read(&path).unwrap();
        let full = TranscriptReader::new().read(&path).unwrap();
        assert_eq!(*incremental, *full);
        assert_eq!(incremental.total_tokens, 660);
        assert_eq!(incremental.message_count, 3);
        assert_eq!(incremental.model.as_deref(), Some("claude-sonnet-4"));
    }

    #[test]
    fn test_partial_line_is_completed_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let line = assistant_line(40, 2, "claude-opus-4");
        let (head, rest) = line.split_at(20);
        write_file(&path, &assistant_line(100, 10, "claude-opus-4"));
        append(&path, head);

        let reader = TranscriptReader::new();
        // Half a line is not valid JSON yet
        assert_eq!(reader.read(&path).unwrap().total_tokens, 110);

        append(&path, rest);
        let snapshot = reader.read(&path).unwrap();
        assert_eq!(snapshot.total_tokens, 152);
        assert_eq!(snapshot.message_count, 2);
    }

    #[test]
    fn test_unterminated_last_line_is_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let line = assistant_line(5, 5, "claude-opus-4");
        write_file(&path, line.trim_end());

        let reader = TranscriptReader::new();
        assert_eq!(reader.read(&path).unwrap().total_tokens, 10);

        append(&path, "\n");
        append(&path, &assistant_line(1, 1, "claude-opus-4"));
        let snapshot = reader.read(&path).unwrap();
        assert_eq!(snapshot.total_tokens, 12);
        assert_eq!(snapshot.message_count, 2);
    }

    #[test]
    fn test_truncated_file_is_rescanned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        let mut content = assistant_line(1000, 100, "claude-opus-4");
        content.push_str(&assistant_line(1000, 100, "claude-opus-4"));
        write_file(&path, &content);

        let reader = TranscriptReader::new();
        assert_eq!(reader.read(&path).unwrap().total_tokens, 2200);

        write_file(&path, &assistant_line(1, 1, "claude-haiku-4"));
        let snapshot = reader.read(&path).unwrap();
        assert_eq!(snapshot.total_tokens, 2);
        assert_eq!(snapshot.message_count, 1);
        assert_eq!(snapshot.model.as_deref(), Some("claude-haiku-4"));
    }

    #[test]
    fn test_deleted_file_drops_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, &assistant_line(1, 1, "claude-opus-4"));

        let reader = TranscriptReader::new();
        assert!(reader.read(&path).is_some());

        std::fs::remove_file(&path).unwrap();
        assert!(reader.read(&path).is_none());

        write_file(&path, &assistant_line(2, 2, "claude-opus-4"));
        assert_eq!(reader.read(&path).unwrap().total_tokens, 4);
    }

    #[test]
    fn test_context_health_near_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, &assistant_line(170_000, 0, "claude-haiku-3-5"));

        let health = TranscriptReader::new()
            .context_health(&path, &ModelCapacities::default())
            .unwrap();
        assert_eq!(health.percent, 85);
        assert_eq!(health.status, HealthStatus::Critical);
        assert!(health.should_compact);
        assert_eq!(health.remaining, 30_000);
    }

    #[test]
    fn test_replaced_file_matches_full_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jsonl");
        write_file(&path, &assistant_line(1000, 100, "m-a"));

        let reader = TranscriptReader::new();
        assert_eq!(reader.read(&path).unwrap().total_tokens, 1100);

        // Longer replacement moved into place over the original
        let replacement = dir.path().join("t.jsonl.tmp");
        let mut content = assistant_line(7, 3, "m-b");
        content.push_str(&assistant_line(20, 20, "m-c"));
        write_file(&replacement, &content);
        std::fs::rename(&replacement, &path).unwrap();

        let incremental = reader.read(&path).unwrap();
        let full = TranscriptReader::new().read(&path).unwrap();
        assert_eq!(*incremental, *full);
        assert_eq!(incremental.total_tokens, 50);
        assert_eq!(incremental.message_count, 2);
        assert_eq!(incremental.model.as_deref(), Some("m-c"));
    }
}
