//! Archive structure inspection via the external archiver's listing mode.
//!
//! Used by `info` style surfaces to show what an archive contains without
//! extracting it. Inspection is advisory; a missing tool degrades to "no
//! structure available".

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::Path;
use std::process::Command;

/// Summary of an archive's internal layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStructure {
    /// Unique first path components, sorted.
    pub top_level: Vec<String>,
    pub file_count: usize,
    pub dir_count: usize,
}

impl ArchiveStructure {
    /// The single top-level directory wrapping the whole archive, if the
    /// layout has one.
    #[must_use]
    pub fn single_root(&self) -> Option<&str> {
        match self.top_level.as_slice() {
            [root] => Some(root.as_str()),
            _ => None,
        }
    }
}

pub trait ArchiveStructureInspector: Send + Sync + Debug {
    /// List the archive's layout, or `None` when listing is unavailable.
    fn inspect(&self, path: &Path) -> Option<ArchiveStructure>;
}

/// Inspects archives through `<tool> l -slt <archive>`.
#[derive(Debug, Clone)]
pub struct ToolStructureInspector {
    tool: String,
}

impl ToolStructureInspector {
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    fn parse_listing(output: &str) -> ArchiveStructure {
        let mut top_level = BTreeSet::new();
        let mut file_count = 0;
        let mut dir_count = 0;
        let mut entry_path: Option<&str> = None;
        let mut entry_is_dir = false;
        let mut in_entries = false;

        let mut close_entry = |path: Option<&str>, is_dir: bool| {
            let Some(path) = path else { return };
            if is_dir {
                dir_count += 1;
            } else {
                file_count += 1;
            }
            let first = path
                .split(['/', '\\'])
                .find(|part| !part.is_empty())
                .unwrap_or(path);
            top_level.insert(first.to_string());
        };

        for line in output.lines() {
            let line = line.trim_end();
            // Entry blocks start after the `----------` separator; lines
            // before it describe the archive itself.
            if line.starts_with("----------") {
                in_entries = true;
                continue;
            }
            if !in_entries {
                continue;
            }
            if line.is_empty() {
                close_entry(entry_path.take(), entry_is_dir);
                entry_is_dir = false;
            } else if let Some(path) = line.strip_prefix("Path = ") {
                entry_path = Some(path);
            } else if let Some(attrs) = line.strip_prefix("Attributes = ") {
                entry_is_dir = attrs.contains('D');
            } else if let Some(folder) = line.strip_prefix("Folder = ") {
                entry_is_dir = entry_is_dir || folder.trim() == "+";
            }
        }
        close_entry(entry_path.take(), entry_is_dir);

        ArchiveStructure {
            top_level: top_level.into_iter().collect(),
            file_count,
            dir_count,
        }
    }
}

impl ArchiveStructureInspector for ToolStructureInspector {
    fn inspect(&self, path: &Path) -> Option<ArchiveStructure> {
        let output = Command::new(&self.tool)
            .arg("l")
            .arg("-slt")
            .arg(path)
            .output()
            .map_err(|e| {
                log::debug!("structure listing unavailable ({}): {e}", self.tool);
                e
            })
            .ok()?;
        if !output.status.success() {
            log::debug!(
                "structure listing failed for {}: {}",
                path.display(),
                output.status
            );
            return None;
        }
        Some(Self::parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Inspector for setups without an external archiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStructureInspector;

impl ArchiveStructureInspector for NoopStructureInspector {
    fn inspect(&self, _path: &Path) -> Option<ArchiveStructure> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Listing archive: a.zip

--
Path = a.zip
Type = zip

----------
Path = album
Folder = +
Attributes = D

Path = album/01.flac
Folder = -
Attributes = A

Path = album/02.flac
Folder = -
Attributes = A

Path = album/scans
Attributes = D

Path = album/scans/front.png
Attributes = A
";

    #[test]
    fn test_parse_listing() {
        let structure = ToolStructureInspector::parse_listing(LISTING);
        assert_eq!(structure.top_level, vec!["album".to_string()]);
        assert_eq!(structure.file_count, 3);
        assert_eq!(structure.dir_count, 2);
        assert_eq!(structure.single_root(), Some("album"));
    }

    #[test]
    fn test_multiple_roots() {
        let listing = "\
----------
Path = readme.txt
Attributes = A

Path = data
Attributes = D
";
        let structure = ToolStructureInspector::parse_listing(listing);
        assert_eq!(
            structure.top_level,
            vec!["data".to_string(), "readme.txt".to_string()]
        );
        assert!(structure.single_root().is_none());
    }

    #[test]
    fn test_noop_inspector() {
        assert!(NoopStructureInspector.inspect(Path::new("a.zip")).is_none());
    }

    #[test]
    fn test_missing_tool_is_soft() {
        let inspector = ToolStructureInspector::new("definitely-not-a-binary");
        assert!(inspector.inspect(Path::new("a.zip")).is_none());
    }
}
