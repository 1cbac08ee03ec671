//! The restore state machine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use nameset_core::marker::IdentityMarker;
use nameset_core::model::{base_name, ArchiveRecord, HistoryEntry};
use nameset_core::schema::Database;
use nameset_core::{ArchiveId, Result};

use nameset_engine::CommentStore;

use crate::outcome::{RestoreOutcome, RestoreStatus};

/// Extensions scanned by default.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["zip", "rar", "7z"];

/// Knobs for a directory restore run.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub recursive: bool,
    /// Lowercase extensions to include; `None` means every file.
    pub extensions: Option<Vec<String>>,
    /// Plan moves without touching the filesystem.
    pub dry_run: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: Some(
                SUPPORTED_EXTENSIONS
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            ),
            dry_run: true,
        }
    }
}

/// How the identity was found, and what came with it.
struct Lookup {
    id: ArchiveId,
    history: Option<HistoryEntry>,
    record: Option<ArchiveRecord>,
}

/// Restores misplaced archives to the destinations their history records.
///
/// Lookup runs in two tiers: the file itself (marker id or exact recorded
/// path), then history rows matching the file's name. An ambiguous history
/// match is only reported if the first tier found nothing.
#[derive(Debug)]
pub struct PathRestorer {
    db: Database,
    comments: Arc<dyn CommentStore>,
    create_missing_dirs: bool,
    cancel: Arc<AtomicBool>,
}

impl PathRestorer {
    #[must_use]
    pub fn new(db: Database, comments: Arc<dyn CommentStore>) -> Self {
        Self {
            db,
            comments,
            create_missing_dirs: true,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a restorer over the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>, comments: Arc<dyn CommentStore>) -> Result<Self> {
        Ok(Self::new(Database::open(db_path)?, comments))
    }

    #[must_use]
    pub fn with_create_missing_dirs(mut self, create: bool) -> Self {
        self.create_missing_dirs = create;
        self
    }

    /// Flag checked between files; set it to stop a directory run.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Restore every matching file under `dir`, reporting each outcome to
    /// `on_progress` as it lands. Store faults become `Error` outcomes so
    /// one bad row never aborts the sweep.
    pub fn restore_directory(
        &self,
        dir: &Path,
        options: &RestoreOptions,
        mut on_progress: impl FnMut(&RestoreOutcome),
    ) -> Vec<RestoreOutcome> {
        let mut outcomes = Vec::new();
        if !dir.exists() {
            log::warn!("source directory does not exist: {}", dir.display());
            return outcomes;
        }

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            if self.cancel.load(Ordering::SeqCst) {
                log::info!("restore cancelled after {} files", outcomes.len());
                break;
            }
            let path = entry.path();
            if !matches_extensions(path, options.extensions.as_deref()) {
                continue;
            }
            let outcome = self
                .restore_file(path, options.dry_run)
                .unwrap_or_else(|e| {
                    RestoreOutcome::terminal(
                        path.to_path_buf(),
                        RestoreStatus::Error,
                        e.to_string(),
                    )
                });
            on_progress(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Restore a single file. Returns `Err` only on store faults; every
    /// per-file condition is a typed outcome.
    pub fn restore_file(&self, path: &Path, dry_run: bool) -> Result<RestoreOutcome> {
        if !path.exists() {
            return Ok(RestoreOutcome::terminal(
                path.to_path_buf(),
                RestoreStatus::Missing,
                "file does not exist",
            ));
        }

        let source_abs = absolute(path);
        let filename = base_name(path);

        let mut fallback: Option<RestoreOutcome> = None;
        let lookup = match self.lookup_via_record(&source_abs)? {
            Some(lookup) => Some(lookup),
            None => match self.lookup_via_history(path, &filename)? {
                HistoryLookup::Found(lookup) => Some(lookup),
                HistoryLookup::Ambiguous(outcome) => {
                    fallback = Some(outcome);
                    None
                }
                HistoryLookup::Nothing => None,
            },
        };

        let Some(lookup) = lookup else {
            if let Some(outcome) = fallback {
                return Ok(outcome);
            }
            return Ok(RestoreOutcome::terminal(
                path.to_path_buf(),
                RestoreStatus::NoMatch,
                "no record or history row matches this file",
            ));
        };

        let Lookup {
            id,
            history,
            record,
        } = lookup;
        let history_id = history.as_ref().map(|entry| entry.id);
        let record = match record {
            Some(record) => Some(record),
            None => self.db.get_record(&id)?,
        };

        let target = history
            .as_ref()
            .and_then(|entry| entry.snapshot.as_ref())
            .and_then(|snapshot| snapshot.recorded_path().map(PathBuf::from))
            .or_else(|| record.as_ref().map(|record| record.file_path.clone()));
        let Some(target) = target else {
            return Ok(RestoreOutcome {
                source_path: path.to_path_buf(),
                archive_id: Some(id),
                target_path: None,
                status: RestoreStatus::NoTarget,
                message: "no destination recorded in history or record".to_string(),
                history_id,
            });
        };
        let target_abs = absolute(&target);

        if source_abs == target_abs {
            // Normalize the stored path to the file's real location.
            self.db.update_file_path(&id, &target_abs)?;
            return Ok(RestoreOutcome {
                source_path: path.to_path_buf(),
                archive_id: Some(id),
                target_path: Some(target_abs),
                status: RestoreStatus::Aligned,
                message: "already at the recorded destination".to_string(),
                history_id,
            });
        }

        if dry_run {
            return Ok(RestoreOutcome {
                source_path: path.to_path_buf(),
                archive_id: Some(id),
                target_path: Some(target_abs.clone()),
                status: RestoreStatus::Planned,
                message: format!("would move to {}", target_abs.display()),
                history_id,
            });
        }

        // Occupancy is checked before any directory creation so a skip
        // leaves the tree exactly as it was found.
        if target_abs.exists() {
            return Ok(RestoreOutcome {
                source_path: path.to_path_buf(),
                archive_id: Some(id),
                target_path: Some(target_abs),
                status: RestoreStatus::Skipped,
                message: "destination already occupied".to_string(),
                history_id,
            });
        }

        if self.create_missing_dirs {
            if let Some(parent) = target_abs.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    return Ok(RestoreOutcome {
                        source_path: path.to_path_buf(),
                        archive_id: Some(id),
                        target_path: Some(target_abs),
                        status: RestoreStatus::Error,
                        message: e.to_string(),
                        history_id,
                    });
                }
            }
        }

        match move_file(&source_abs, &target_abs) {
            Ok(()) => {
                self.db.update_file_path(&id, &target_abs)?;
                log::info!(
                    "restored {} -> {} ({id})",
                    source_abs.display(),
                    target_abs.display()
                );
                Ok(RestoreOutcome {
                    source_path: path.to_path_buf(),
                    archive_id: Some(id),
                    target_path: Some(target_abs),
                    status: RestoreStatus::Moved,
                    message: "moved and store updated".to_string(),
                    history_id,
                })
            }
            Err(e) => {
                log::error!(
                    "move failed: {} -> {}: {e}",
                    source_abs.display(),
                    target_abs.display()
                );
                Ok(RestoreOutcome {
                    source_path: path.to_path_buf(),
                    archive_id: Some(id),
                    target_path: Some(target_abs),
                    status: RestoreStatus::Error,
                    message: e.to_string(),
                    history_id,
                })
            }
        }
    }

    /// Tier 1: the file itself names its identity, via the embedded marker
    /// or the exact recorded path.
    fn lookup_via_record(&self, source_abs: &Path) -> Result<Option<Lookup>> {
        let marker_id = self
            .comments
            .read(source_abs)
            .as_deref()
            .and_then(IdentityMarker::extract_id);

        let lookup = match marker_id {
            // A marker id wins even when the store has no record for it;
            // the missing destination then reports as no-target.
            Some(id) => Some(Lookup {
                record: self.db.get_record(&id)?,
                history: None,
                id,
            }),
            None => self.db.get_record_by_path(source_abs)?.map(|record| Lookup {
                id: record.id.clone(),
                history: None,
                record: Some(record),
            }),
        };
        Ok(lookup)
    }

    /// Tier 2: history rows whose `new_name` equals the file's name. More
    /// than one distinct archive id is ambiguous, never a guess.
    fn lookup_via_history(&self, path: &Path, filename: &str) -> Result<HistoryLookup> {
        let rows = self.db.find_history_by_new_name(filename)?;
        let Some(first) = rows.first() else {
            return Ok(HistoryLookup::Nothing);
        };
        if rows
            .iter()
            .any(|entry| entry.archive_id != first.archive_id)
        {
            return Ok(HistoryLookup::Ambiguous(RestoreOutcome::terminal(
                path.to_path_buf(),
                RestoreStatus::Ambiguous,
                format!("\"{filename}\" appears in the history of multiple archives"),
            )));
        }
        Ok(HistoryLookup::Found(Lookup {
            id: first.archive_id.clone(),
            history: rows.into_iter().next(),
            record: None,
        }))
    }
}

enum HistoryLookup {
    Found(Lookup),
    Ambiguous(RestoreOutcome),
    Nothing,
}

fn matches_extensions(path: &Path, extensions: Option<&[String]>) -> bool {
    let Some(extensions) = extensions else {
        return true;
    };
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(&ext)))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Rename, falling back to copy-and-remove across devices.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_extensions() {
        let exts = vec!["zip".to_string(), "rar".to_string()];
        assert!(matches_extensions(Path::new("a.zip"), Some(&exts)));
        assert!(matches_extensions(Path::new("a.ZIP"), Some(&exts)));
        assert!(!matches_extensions(Path::new("a.7z"), Some(&exts)));
        assert!(!matches_extensions(Path::new("noext"), Some(&exts)));
        assert!(matches_extensions(Path::new("anything.bin"), None));
    }

    #[test]
    fn test_default_options() {
        let options = RestoreOptions::default();
        assert!(options.recursive);
        assert!(options.dry_run);
        assert_eq!(
            options.extensions.as_deref(),
            Some(&["zip".to_string(), "rar".to_string(), "7z".to_string()][..])
        );
    }
}
