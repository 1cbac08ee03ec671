//! The external comment capability.
//!
//! Archives carry their identity marker in an out-of-band comment slot.
//! Reading and writing that slot goes through an external archiver process;
//! both directions are best-effort and never abort the pipeline. The store
//! variant is chosen at construction time: tool-backed when an archiver is
//! configured, no-op otherwise, in-memory for tests and embedders.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

/// Best-effort access to an archive's comment slot.
///
/// `read` returns `None` both for "no comment" and "could not read"; the
/// distinction never matters to callers, who fall through to the next
/// resolution tier either way. `write` reports success so minting can log
/// a marker that exists only in the store.
pub trait CommentStore: Send + Sync + std::fmt::Debug {
    fn read(&self, path: &Path) -> Option<String>;
    fn write(&self, path: &Path, comment: &str) -> bool;
}

/// Comment access through external archiver processes: a `7z`-compatible
/// lister for reads and a Bandizip-compatible writer taking a comment file.
#[derive(Debug, Clone)]
pub struct ToolCommentStore {
    read_tool: String,
    write_tool: Option<String>,
}

impl ToolCommentStore {
    #[must_use]
    pub fn new(read_tool: impl Into<String>, write_tool: Option<String>) -> Self {
        Self {
            read_tool: read_tool.into(),
            write_tool,
        }
    }

    /// Pull the `Comment = ` field out of `<tool> l -slt` output. Comments
    /// span multiple lines (the marker is pretty-printed JSON), so lines
    /// after the field are collected until the next `Key = value` field.
    fn parse_listing(output: &str) -> Option<String> {
        let mut lines = output.lines();
        let head = loop {
            let line = lines.next()?;
            if let Some(comment) = line.strip_prefix("Comment = ") {
                break comment;
            }
        };

        let mut collected = vec![head];
        for line in lines {
            if is_listing_field(line) {
                break;
            }
            collected.push(line);
        }
        let comment = collected.join("\n").trim().to_string();
        if comment.is_empty() {
            None
        } else {
            Some(comment)
        }
    }
}

impl CommentStore for ToolCommentStore {
    fn read(&self, path: &Path) -> Option<String> {
        let output = Command::new(&self.read_tool)
            .arg("l")
            .arg("-slt")
            .arg(path)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Self::parse_listing(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                log::debug!(
                    "{} exited with {} for {}",
                    self.read_tool,
                    output.status,
                    path.display()
                );
                None
            }
            Err(e) => {
                log::debug!("failed to run {}: {}", self.read_tool, e);
                None
            }
        }
    }

    fn write(&self, path: &Path, comment: &str) -> bool {
        let Some(write_tool) = &self.write_tool else {
            log::warn!(
                "no comment write tool configured, marker not written to {}",
                path.display()
            );
            return false;
        };

        // The writer takes the comment through a file, keeping the payload
        // out of argv and in UTF-8.
        let mut tmp = match tempfile::NamedTempFile::new() {
            Ok(tmp) => tmp,
            Err(e) => {
                log::warn!("failed to create comment temp file: {e}");
                return false;
            }
        };
        if let Err(e) = tmp.write_all(comment.as_bytes()) {
            log::warn!("failed to write comment temp file: {e}");
            return false;
        }

        let status = Command::new(write_tool)
            .arg("a")
            .arg("-y")
            .arg(format!("-cmtfile:{}", tmp.path().display()))
            .arg(path)
            .status();

        match status {
            Ok(status) if status.success() => {
                log::debug!("marker written to {}", path.display());
                true
            }
            Ok(status) => {
                log::warn!(
                    "{} exited with {} writing marker to {}",
                    write_tool,
                    status,
                    path.display()
                );
                false
            }
            Err(e) => {
                log::warn!("failed to run {write_tool}: {e}");
                false
            }
        }
    }
}

/// Whether a listing line is a `Key = value` field rather than comment
/// content. JSON comment lines start with quotes, braces, or indentation.
fn is_listing_field(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_alphabetic()) && line.contains(" = ")
}

/// Degraded variant for setups without an archiver: reads nothing, writes
/// nothing, resolution relies on the path/hash/fuzzy tiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCommentStore;

impl CommentStore for NoopCommentStore {
    fn read(&self, _path: &Path) -> Option<String> {
        None
    }

    fn write(&self, path: &Path, _comment: &str) -> bool {
        log::debug!("comment capability unavailable for {}", path.display());
        false
    }
}

/// In-process comment slots keyed by path. Used by tests and embedders
/// that manage markers themselves. Keys follow the file when callers
/// re-register them; this store does not watch the filesystem.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    slots: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryCommentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a stored comment to a new key, mirroring a filesystem rename.
    pub fn rename(&self, from: &Path, to: &Path) {
        if let Ok(mut slots) = self.slots.lock() {
            if let Some(comment) = slots.remove(from) {
                slots.insert(to.to_path_buf(), comment);
            }
        }
    }
}

impl CommentStore for MemoryCommentStore {
    fn read(&self, path: &Path) -> Option<String> {
        self.slots.lock().ok()?.get(path).cloned()
    }

    fn write(&self, path: &Path, comment: &str) -> bool {
        match self.slots.lock() {
            Ok(mut slots) => {
                slots.insert(path.to_path_buf(), comment.to_string());
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let output = "Path = a.zip\nType = zip\nComment = {\"id\": \"AB\"}\n";
        assert_eq!(
            ToolCommentStore::parse_listing(output).as_deref(),
            Some("{\"id\": \"AB\"}")
        );
        assert!(ToolCommentStore::parse_listing("Path = a.zip\n").is_none());
        assert!(ToolCommentStore::parse_listing("Comment = \n").is_none());
    }

    #[test]
    fn test_parse_listing_multiline_comment() {
        let output = "Type = zip\nComment = {\n  \"id\": \"AB12\"\n}\nPhysical Size = 123\n";
        assert_eq!(
            ToolCommentStore::parse_listing(output).as_deref(),
            Some("{\n  \"id\": \"AB12\"\n}")
        );
    }

    #[test]
    fn test_memory_store_round_trip_and_rename() {
        let store = MemoryCommentStore::new();
        let a = Path::new("/x/a.zip");
        let b = Path::new("/x/b.zip");

        assert!(store.read(a).is_none());
        assert!(store.write(a, "id: AB12"));
        assert_eq!(store.read(a).as_deref(), Some("id: AB12"));

        store.rename(a, b);
        assert!(store.read(a).is_none());
        assert_eq!(store.read(b).as_deref(), Some("id: AB12"));
    }

    #[test]
    fn test_noop_store() {
        let store = NoopCommentStore;
        assert!(store.read(Path::new("/x/a.zip")).is_none());
        assert!(!store.write(Path::new("/x/a.zip"), "id: AB12"));
    }

    #[test]
    fn test_tool_store_missing_binary_is_soft() {
        let store = ToolCommentStore::new("definitely-not-a-real-archiver", None);
        assert!(store.read(Path::new("/x/a.zip")).is_none());
        assert!(!store.write(Path::new("/x/a.zip"), "id: AB12"));
    }
}
