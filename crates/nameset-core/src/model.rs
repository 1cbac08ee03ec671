use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::snapshot::MetadataSnapshot;
use crate::ArchiveId;

/// Current known state of one archive identity.
///
/// One row per identity in `archive_info`. The id is immutable; everything
/// else tracks the most recent successful event and may lag behind the real
/// filesystem if a move happened out of band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: ArchiveId,
    /// Last known absolute location on disk.
    pub file_path: PathBuf,
    /// Content digest at last observation. Expensive to keep fresh, so it is
    /// only updated opportunistically.
    pub file_hash: Option<String>,
    /// Base name component of `file_path`.
    pub current_name: String,
    /// Optional free-text classification tag.
    pub artist_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchiveRecord {
    /// Create a record for a newly observed archive, stamping both
    /// timestamps with the current time.
    #[must_use]
    pub fn new(
        id: ArchiveId,
        file_path: PathBuf,
        current_name: impl Into<String>,
        artist_name: Option<String>,
        file_hash: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_path,
            file_hash,
            current_name: current_name.into(),
            artist_name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One append-only provenance event for an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Sequence number assigned by the store.
    pub id: i64,
    pub archive_id: ArchiveId,
    /// Name before the event; `None` for the initial creation event.
    pub old_name: Option<String>,
    pub new_name: String,
    /// Free-text cause tag, e.g. "rename" or "restore".
    pub reason: Option<String>,
    /// Self-contained provenance snapshot taken at the moment of the event.
    /// Any single entry is enough to reconstruct the full history even if
    /// earlier rows were pruned.
    pub snapshot: Option<MetadataSnapshot>,
    pub timestamp: DateTime<Utc>,
}

/// Extract the base name component of a path as UTF-8, lossily.
#[must_use]
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
