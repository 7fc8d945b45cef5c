//! Command history (persisted) and captured output history (in memory).

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Outputs kept by [`OutputHistory`].
pub const MAX_OUTPUT_HISTORY: usize = 10;
/// Bytes of a single output kept before truncation.
pub const MAX_OUTPUT_BYTES: usize = 50_000;
const TRUNCATION_NOTE: &str = "\n... [output truncated]";
const REFERENCE_PREVIEW_CHARS: usize = 200;

/// Lines entered at the prompt, mirrored to a history file.
#[derive(Debug)]
pub struct CommandHistory {
    path: Option<PathBuf>,
    limit: usize,
    entries: Vec<String>,
}

impl CommandHistory {
    /// History that is never written to disk.
    pub fn in_memory(limit: usize) -> Self {
        Self {
            path: None,
            limit,
            entries: Vec::new(),
        }
    }

    /// Load existing entries from `path`. A missing file starts empty.
    pub fn load(path: &Path, limit: usize) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(text) => text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_owned)
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read history file {}", path.display()));
            }
        };
        let mut history = Self {
            path: Some(path.to_path_buf()),
            limit,
            entries,
        };
        history.trim_to_limit();
        debug!(path = %path.display(), entries = history.entries.len(), "loaded history");
        Ok(history)
    }

    fn trim_to_limit(&mut self) -> bool {
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
            true
        } else {
            false
        }
    }

    /// Append `line`, skipping blanks and immediate repeats.
    pub fn record(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || self.entries.last().is_some_and(|last| last == line) {
            return;
        }
        self.entries.push(line.to_owned());
        let trimmed = self.trim_to_limit();

        if let Some(path) = &self.path
            && let Err(err) = persist(path, &self.entries, line, trimmed)
        {
            warn!(path = %path.display(), error = %err, "failed to write history");
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entry by 1-based index.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Most recent entry starting with `prefix`.
    pub fn find_prefix(&self, prefix: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.starts_with(prefix))
            .map(String::as_str)
    }
}

fn persist(path: &Path, entries: &[String], line: &str, rewrite: bool) -> std::io::Result<()> {
    if rewrite {
        let mut text = entries.join("\n");
        text.push('\n');
        return fs::write(path, text);
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEntry {
    pub command: String,
    pub output: String,
}

/// Recent stdout captures, newest first.
#[derive(Debug, Default)]
pub struct OutputHistory {
    entries: VecDeque<OutputEntry>,
}

static OUTPUT_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$_|@(\d+)\b").unwrap_or_else(|err| panic!("invalid output reference pattern: {err}"))
});

impl OutputHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `output` for `command`. Blank output is ignored.
    pub fn record(&mut self, command: &str, output: &str) {
        if output.trim().is_empty() {
            return;
        }
        let mut output = output.to_owned();
        if output.len() > MAX_OUTPUT_BYTES {
            let mut cut = MAX_OUTPUT_BYTES;
            while !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
            output.push_str(TRUNCATION_NOTE);
        }
        self.entries.push_front(OutputEntry {
            command: command.to_owned(),
            output: output.trim().to_owned(),
        });
        self.entries.truncate(MAX_OUTPUT_HISTORY);
    }

    /// 0 is the most recent output.
    pub fn get(&self, index: usize) -> Option<&OutputEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace `$_` and `@n` with previews of the referenced outputs.
    /// Returns `None` when nothing was replaced.
    pub fn expand_references(&self, text: &str) -> Option<String> {
        let mut replaced = false;
        let expanded = OUTPUT_REFERENCE.replace_all(text, |caps: &regex::Captures<'_>| {
            let entry = match caps.get(1) {
                Some(index) => index
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.get(index)),
                None => self.get(0),
            };
            match entry {
                Some(entry) => {
                    replaced = true;
                    let preview = preview(&entry.output);
                    if caps.get(1).is_some() {
                        format!("[Output from '{}': {preview}]", entry.command)
                    } else {
                        format!("[Previous output: {preview}]")
                    }
                }
                None => caps[0].to_owned(),
            }
        });
        replaced.then(|| expanded.into_owned())
    }
}

fn preview(output: &str) -> String {
    let mut chars = output.chars();
    let head: String = chars.by_ref().take(REFERENCE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn history_persists_and_skips_repeats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history");
        let mut history = CommandHistory::load(&path, 100).unwrap();
        history.record("ls");
        history.record("ls");
        history.record("  ");
        history.record("git status");

        assert_eq!(history.entries(), ["ls", "git status"]);
        assert_eq!(history.get(1), Some("ls"));
        assert_eq!(history.get(0), None);
        assert_eq!(history.find_prefix("gi"), Some("git status"));

        let reloaded = CommandHistory::load(&path, 100).unwrap();
        assert_eq!(reloaded.entries(), ["ls", "git status"]);
    }

    #[test]
    fn history_is_trimmed_to_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history");
        let mut history = CommandHistory::load(&path, 2).unwrap();
        for line in ["a", "b", "c"] {
            history.record(line);
        }
        assert_eq!(history.entries(), ["b", "c"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), "b\nc\n");
    }

    #[test]
    fn output_history_keeps_newest_ten() {
        let mut outputs = OutputHistory::new();
        for i in 0..12 {
            outputs.record(&format!("cmd {i}"), &format!("out {i}\n"));
        }
        outputs.record("quiet", "   \n");
        assert_eq!(outputs.len(), MAX_OUTPUT_HISTORY);
        assert_eq!(outputs.get(0).unwrap().output, "out 11");
        assert_eq!(outputs.get(9).unwrap().command, "cmd 2");
    }

    #[test]
    fn large_outputs_are_truncated() {
        let mut outputs = OutputHistory::new();
        outputs.record("big", &"é".repeat(MAX_OUTPUT_BYTES));
        let stored = &outputs.get(0).unwrap().output;
        assert!(stored.ends_with("[output truncated]"));
        assert!(stored.len() <= MAX_OUTPUT_BYTES + TRUNCATION_NOTE.len());
    }

    #[test]
    fn references_expand_to_previews() {
        let mut outputs = OutputHistory::new();
        assert_eq!(outputs.expand_references("summarize $_"), None);

        outputs.record("ls", "a.txt\nb.txt");
        outputs.record("whoami", "root");
        assert_eq!(
            outputs.expand_references("greet $_").as_deref(),
            Some("greet [Previous output: root]")
        );
        assert_eq!(
            outputs.expand_references("count @1 and @7").as_deref(),
            Some("count [Output from 'ls': a.txt\nb.txt] and @7")
        );
        assert_eq!(outputs.expand_references("mail me@host"), None);
    }
}
