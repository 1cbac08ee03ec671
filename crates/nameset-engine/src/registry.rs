//! The rename orchestrator.
//!
//! Combines the identity resolver, the provenance store, and the actual
//! filesystem rename into one operation: resolve identity, rename if
//! needed, record provenance. Filesystem failures after a successful
//! resolution keep the id in the outcome so callers can retry the rename
//! without re-resolving.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nameset_core::model::{base_name, ArchiveRecord, HistoryEntry};
use nameset_core::schema::Database;
use nameset_core::snapshot::{MetadataSnapshot, OperationContext};
use nameset_core::ArchiveId;

use crate::comment::CommentStore;
use crate::error::EngineResult;
use crate::resolver::{IdentityResolver, Resolution};

/// The tool tag recorded in operation contexts.
const RENAMED_BY: &str = "nameset";

/// Typed outcome of one `process_rename` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameStatus {
    /// File renamed and provenance recorded.
    Renamed,
    /// Target name equals the current name; marker and record ensured, no
    /// history appended.
    Unchanged,
    /// Source path does not exist.
    MissingFile,
    /// Marker and store disagree on the identity; nothing was touched.
    Conflict,
    /// The filesystem rename failed; the resolved id is still valid.
    RenameFailed,
    /// The store write failed after the filesystem rename; the resolution
    /// tiers self-heal this on the next run.
    StoreFailed,
}

impl fmt::Display for RenameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Renamed => "renamed",
            Self::Unchanged => "unchanged",
            Self::MissingFile => "missing-file",
            Self::Conflict => "conflict",
            Self::RenameFailed => "rename-failed",
            Self::StoreFailed => "store-failed",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct RenameOutcome {
    pub status: RenameStatus,
    pub archive_id: Option<ArchiveId>,
    pub new_path: Option<PathBuf>,
    pub message: String,
}

impl RenameOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, RenameStatus::Renamed | RenameStatus::Unchanged)
    }
}

/// Orchestrates identity resolution, renaming, and provenance recording
/// against one store handle. Each instance owns its handle, so tests and
/// workers can run isolated registries in-process.
#[derive(Debug)]
pub struct ArchiveRegistry {
    db: Database,
    comments: Arc<dyn CommentStore>,
}

impl ArchiveRegistry {
    #[must_use]
    pub fn new(db: Database, comments: Arc<dyn CommentStore>) -> Self {
        Self { db, comments }
    }

    /// Open a registry over the store at `db_path`.
    pub fn open(
        db_path: impl AsRef<Path>,
        comments: Arc<dyn CommentStore>,
    ) -> EngineResult<Self> {
        Ok(Self::new(Database::open(db_path)?, comments))
    }

    #[must_use]
    pub fn store(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn store_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Resolve (or mint) the archive's identity without renaming anything.
    pub fn assign(&self, path: &Path, artist: Option<&str>) -> EngineResult<Resolution> {
        IdentityResolver::new(&self.db, self.comments.as_ref()).resolve(path, artist)
    }

    /// Resolve identity, rename if needed, record provenance.
    pub fn process_rename(
        &mut self,
        path: &Path,
        new_name: &str,
        artist: Option<&str>,
    ) -> RenameOutcome {
        if !path.exists() {
            return RenameOutcome {
                status: RenameStatus::MissingFile,
                archive_id: None,
                new_path: None,
                message: format!("source does not exist: {}", path.display()),
            };
        }

        let current_name = base_name(path);
        log::info!("processing rename: {current_name} -> {new_name}");

        let resolution =
            match IdentityResolver::new(&self.db, self.comments.as_ref())
                .resolve(path, artist)
            {
                Ok(resolution) => resolution,
                Err(e) => {
                    return RenameOutcome {
                        status: RenameStatus::StoreFailed,
                        archive_id: None,
                        new_path: None,
                        message: e.to_string(),
                    }
                }
            };
        let id = match resolution {
            Resolution::Resolved { id, tier, .. } => {
                log::debug!("resolved {} via {} tier", id, tier);
                id
            }
            Resolution::Conflict {
                marker_id,
                path_id,
            } => {
                return RenameOutcome {
                    status: RenameStatus::Conflict,
                    archive_id: None,
                    new_path: None,
                    message: format!(
                        "marker says {marker_id}, path recorded under {path_id}"
                    ),
                }
            }
        };

        if current_name == new_name {
            // Resolution already ensured the marker and the record exist;
            // a same-name request appends no history.
            log::debug!("name unchanged, skipping rename: {new_name}");
            return RenameOutcome {
                status: RenameStatus::Unchanged,
                archive_id: Some(id),
                new_path: Some(path.to_path_buf()),
                message: "name unchanged".to_string(),
            };
        }

        let new_path = path
            .parent()
            .map_or_else(|| PathBuf::from(new_name), |dir| dir.join(new_name));
        if let Err(e) = fs::rename(path, &new_path) {
            log::error!(
                "rename failed: {} -> {}: {}",
                path.display(),
                new_path.display(),
                e
            );
            return RenameOutcome {
                status: RenameStatus::RenameFailed,
                archive_id: Some(id),
                new_path: None,
                message: e.to_string(),
            };
        }

        let context = OperationContext {
            artist_name: artist.map(String::from),
            file_path: Some(new_path.to_string_lossy().into_owned()),
            renamed_by: Some(RENAMED_BY.to_string()),
            operation_type: Some("rename".to_string()),
            source: Some(RENAMED_BY.to_string()),
            file_size: fs::metadata(&new_path).ok().map(|m| m.len()),
            file_extension: new_path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase()),
        };

        if let Err(e) =
            self.db
                .update_current_name(&id, new_name, Some(&current_name), "rename", context)
        {
            // The file is renamed but the event is unrecorded; the path and
            // hash tiers recover the identity on the next run.
            log::error!("store write failed for {id}: {e}");
            return RenameOutcome {
                status: RenameStatus::StoreFailed,
                archive_id: Some(id),
                new_path: Some(new_path),
                message: e.to_string(),
            };
        }
        RenameOutcome {
            status: RenameStatus::Renamed,
            archive_id: Some(id),
            new_path: Some(new_path),
            message: format!("{current_name} -> {new_name}"),
        }
    }

    // Query passthroughs for the CLI and embedders.

    pub fn archive_info(&self, id: &ArchiveId) -> EngineResult<Option<ArchiveRecord>> {
        Ok(self.db.get_record(id)?)
    }

    pub fn history(&self, id: &ArchiveId, limit: usize) -> EngineResult<Vec<HistoryEntry>> {
        Ok(self.db.get_history(id, limit)?)
    }

    pub fn search(
        &self,
        query: &str,
        artist: Option<&str>,
    ) -> EngineResult<Vec<ArchiveRecord>> {
        Ok(self.db.find_by_fuzzy_name(query, artist)?)
    }

    pub fn complete_metadata(
        &self,
        id: &ArchiveId,
    ) -> EngineResult<Option<MetadataSnapshot>> {
        Ok(self.db.get_complete_metadata(id)?)
    }

    /// The id carried by the archive's marker, if any. Reads only the
    /// comment slot; the store is not consulted.
    #[must_use]
    pub fn marker_id(&self, path: &Path) -> Option<ArchiveId> {
        self.comments
            .read(path)
            .as_deref()
            .and_then(nameset_core::marker::IdentityMarker::extract_id)
    }
}
