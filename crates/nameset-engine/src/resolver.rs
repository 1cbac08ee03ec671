//! Multi-tier identity resolution.
//!
//! Given a file path, recover the archive's durable identity through an
//! ordered fallback chain: embedded marker, exact path, content hash, fuzzy
//! name, and finally minting a fresh token. Tier failures are recovered
//! locally by falling through; only store I/O faults propagate as errors.

use std::fmt;
use std::path::Path;

use nameset_core::hash::try_content_hash;
use nameset_core::marker::IdentityMarker;
use nameset_core::model::{base_name, ArchiveRecord};
use nameset_core::schema::Database;
use nameset_core::ArchiveId;

use crate::comment::CommentStore;
use crate::error::EngineResult;

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Authoritative: id read from the embedded comment marker.
    Marker,
    /// Exact match on the last recorded path.
    Path,
    /// Content digest match after an out-of-band move.
    Hash,
    /// Approximate match on normalized names; best-effort.
    Fuzzy,
    /// All tiers missed; a new identity was minted.
    Mint,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Marker => "marker",
            Self::Path => "path",
            Self::Hash => "hash",
            Self::Fuzzy => "fuzzy",
            Self::Mint => "mint",
        };
        write!(f, "{name}")
    }
}

/// Typed outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        id: ArchiveId,
        tier: ResolutionTier,
        /// Whether a store row was created during this resolution (fresh
        /// mint, or a rebuild after store loss). Record creation never
        /// appends history.
        record_created: bool,
    },
    /// The marker and the store's path index name different identities.
    /// Neither source is guessed authoritative; the caller surfaces this
    /// and takes no action.
    Conflict {
        marker_id: ArchiveId,
        path_id: ArchiveId,
    },
}

/// Resolves archive identities against a store and a comment capability.
#[derive(Debug)]
pub struct IdentityResolver<'a> {
    db: &'a Database,
    comments: &'a dyn CommentStore,
}

impl<'a> IdentityResolver<'a> {
    #[must_use]
    pub fn new(db: &'a Database, comments: &'a dyn CommentStore) -> Self {
        Self { db, comments }
    }

    /// Resolve the identity of the archive at `path`. Deterministic tier
    /// order, first hit wins.
    pub fn resolve(
        &self,
        path: &Path,
        artist_hint: Option<&str>,
    ) -> EngineResult<Resolution> {
        let current_name = base_name(path);

        // Tier 1: embedded marker.
        if let Some(marker) = self
            .comments
            .read(path)
            .as_deref()
            .and_then(IdentityMarker::parse)
        {
            return self.resolve_marker(path, &current_name, marker, artist_hint);
        }

        // Tier 2: exact path. Covers markers whose write once failed.
        if let Some(record) = self.db.get_record_by_path(path)? {
            log::debug!("path tier hit for {}: {}", path.display(), record.id);
            return Ok(Resolution::Resolved {
                id: record.id,
                tier: ResolutionTier::Path,
                record_created: false,
            });
        }

        // Tier 3: content hash. Covers moves done entirely out of band.
        if let Some(digest) = try_content_hash(path) {
            if let Some(record) = self.db.get_record_by_hash(&digest)? {
                log::info!("hash tier hit for {}: {}", path.display(), record.id);
                // Backfill the marker so the next run hits tier 1 instead of
                // re-hashing the file.
                let marker = IdentityMarker::new(record.id.clone())
                    .with_artist(record.artist_name.clone())
                    .with_extra("matched_from", "database".into());
                let _ = self.comments.write(path, &marker.to_comment());
                self.db.update_file_path(&record.id, path)?;
                return Ok(Resolution::Resolved {
                    id: record.id,
                    tier: ResolutionTier::Hash,
                    record_created: false,
                });
            }
        }

        // Tier 4: fuzzy name.
        let needle = normalize_name(&current_name);
        if !needle.is_empty() {
            let hits = self.db.find_by_fuzzy_name(&needle, artist_hint)?;
            if let Some(best) = hits.into_iter().next() {
                log::info!(
                    "fuzzy tier matched {} to {} ({})",
                    current_name,
                    best.id,
                    best.current_name
                );
                // Backfill the marker so the next run hits tier 1.
                let marker = IdentityMarker::new(best.id.clone())
                    .with_artist(best.artist_name.clone())
                    .with_extra("matched_from", "database".into());
                let _ = self.comments.write(path, &marker.to_comment());
                self.db.update_file_path(&best.id, path)?;
                return Ok(Resolution::Resolved {
                    id: best.id,
                    tier: ResolutionTier::Fuzzy,
                    record_created: false,
                });
            }
        }

        // Tier 5: mint.
        let id = ArchiveId::mint();
        let marker =
            IdentityMarker::new(id.clone()).with_artist(artist_hint.map(String::from));
        if !self.comments.write(path, &marker.to_comment()) {
            log::warn!(
                "marker write failed for {}; identity {} recorded in store only",
                path.display(),
                id
            );
        }
        let record = ArchiveRecord::new(
            id.clone(),
            path.to_path_buf(),
            current_name,
            artist_hint.map(String::from),
            try_content_hash(path),
        );
        self.db.insert_record(&record)?;
        log::info!("minted {} for {}", id, path.display());
        Ok(Resolution::Resolved {
            id,
            tier: ResolutionTier::Mint,
            record_created: true,
        })
    }

    fn resolve_marker(
        &self,
        path: &Path,
        current_name: &str,
        marker: IdentityMarker,
        artist_hint: Option<&str>,
    ) -> EngineResult<Resolution> {
        let id = marker.id;

        // The marker and the path index must agree before either is trusted.
        if let Some(by_path) = self.db.get_record_by_path(path)? {
            if by_path.id != id {
                log::warn!(
                    "identity conflict at {}: marker says {}, path recorded under {}",
                    path.display(),
                    id,
                    by_path.id
                );
                return Ok(Resolution::Conflict {
                    marker_id: id,
                    path_id: by_path.id,
                });
            }
        }

        if let Some(record) = self.db.get_record(&id)? {
            if record.file_path != path {
                self.db.update_file_path(&id, path)?;
            }
            return Ok(Resolution::Resolved {
                id,
                tier: ResolutionTier::Marker,
                record_created: false,
            });
        }

        // Marker intact but the store has no row: the store was reset.
        // Rebuild from observed state instead of minting a second identity.
        let record = ArchiveRecord::new(
            id.clone(),
            path.to_path_buf(),
            current_name,
            artist_hint
                .map(String::from)
                .or_else(|| marker.artist_name.clone()),
            try_content_hash(path),
        );
        self.db.insert_record(&record)?;
        log::info!("rebuilt record for marker id {} at {}", id, path.display());
        Ok(Resolution::Resolved {
            id,
            tier: ResolutionTier::Marker,
            record_created: true,
        })
    }
}

/// Normalize a file name for the fuzzy tier: strip the extension, collapse
/// whitespace runs, and trim surrounding decoration characters.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let stem = name
        .rsplit_once('.')
        .map_or(name, |(stem, _ext)| stem);

    let collapsed: String = stem.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| "[](){}-_~.".contains(c) || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::MemoryCommentStore;
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(bytes)
            .unwrap();
        path
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Final.zip"), "Final");
        assert_eq!(normalize_name("  spaced   out  .zip"), "spaced out");
        assert_eq!(normalize_name("[group] Title (v2).zip"), "group] Title (v2");
        assert_eq!(normalize_name("___.zip"), "");
    }

    #[test]
    fn test_mint_then_marker_tier() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let comments = MemoryCommentStore::new();
        let path = touch(&dir, "raw001.zip", b"bytes-1");

        let resolver = IdentityResolver::new(&db, &comments);
        let Resolution::Resolved {
            id,
            tier,
            record_created,
        } = resolver.resolve(&path, Some("X")).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(tier, ResolutionTier::Mint);
        assert!(record_created);

        // Second resolve hits the marker tier with the same id.
        let Resolution::Resolved {
            id: id2,
            tier: tier2,
            record_created: created2,
        } = resolver.resolve(&path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(id2, id);
        assert_eq!(tier2, ResolutionTier::Marker);
        assert!(!created2);
    }

    #[test]
    fn test_marker_tier_rebuilds_after_store_loss() {
        let dir = TempDir::new().unwrap();
        let comments = MemoryCommentStore::new();
        let path = touch(&dir, "kept.zip", b"bytes-2");

        let marker_id = ArchiveId::new("AB12CD34EF56").unwrap();
        comments.write(
            &path,
            &IdentityMarker::new(marker_id.clone()).to_comment(),
        );

        // Fresh, empty store: the id must survive.
        let db = Database::open_in_memory().unwrap();
        let resolver = IdentityResolver::new(&db, &comments);
        let Resolution::Resolved {
            id,
            tier,
            record_created,
        } = resolver.resolve(&path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(id, marker_id);
        assert_eq!(tier, ResolutionTier::Marker);
        assert!(record_created);

        // No history row from record creation.
        assert!(db.get_history(&marker_id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_path_tier_when_marker_unwritable() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let comments = NoopCommentStoreForTest;
        let path = touch(&dir, "silent.zip", b"bytes-3");

        let resolver = IdentityResolver::new(&db, &comments);
        let Resolution::Resolved { id, tier, .. } =
            resolver.resolve(&path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(tier, ResolutionTier::Mint);

        let Resolution::Resolved { id: id2, tier, .. } =
            resolver.resolve(&path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(id2, id);
        assert_eq!(tier, ResolutionTier::Path);
    }

    #[test]
    fn test_hash_tier_after_oob_move() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let comments = MemoryCommentStore::new();
        let old_path = touch(&dir, "a.zip", b"stable bytes");

        let resolver = IdentityResolver::new(&db, &comments);
        let Resolution::Resolved { id, .. } = resolver.resolve(&old_path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };

        // Move the file out of band; the marker key does not follow.
        std::fs::create_dir_all(dir.path().join("Y")).unwrap();
        let new_path = dir.path().join("Y").join("a.zip");
        std::fs::rename(&old_path, &new_path).unwrap();

        let Resolution::Resolved { id: id2, tier, .. } =
            resolver.resolve(&new_path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(id2, id);
        assert_eq!(tier, ResolutionTier::Hash);

        // Path synced without any history row.
        let record = db.get_record(&id).unwrap().unwrap();
        assert_eq!(record.file_path, new_path);
        assert!(db.get_history(&id, 10).unwrap().is_empty());

        // The marker was rewritten at the new path, so the next resolve
        // hits tier 1 instead of re-hashing.
        let marker = comments
            .read(&new_path)
            .as_deref()
            .and_then(IdentityMarker::parse)
            .expect("backfilled marker");
        assert_eq!(marker.id, id);
        assert_eq!(
            marker.extra.get("matched_from").and_then(|v| v.as_str()),
            Some("database")
        );
        let Resolution::Resolved { tier, .. } = resolver.resolve(&new_path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(tier, ResolutionTier::Marker);
    }

    #[test]
    fn test_fuzzy_tier_backfills_marker() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let comments = MemoryCommentStore::new();
        let path = touch(&dir, "Unique Title.zip", b"bytes-4");

        // Seed a record under a different path with a matching name and
        // different bytes, so only the fuzzy tier can match.
        let seeded = ArchiveRecord::new(
            ArchiveId::mint(),
            dir.path().join("elsewhere").join("Unique Title.zip"),
            "Unique Title.zip",
            None,
            Some("unrelated-hash".to_string()),
        );
        db.insert_record(&seeded).unwrap();

        let resolver = IdentityResolver::new(&db, &comments);
        let Resolution::Resolved { id, tier, .. } =
            resolver.resolve(&path, None).unwrap()
        else {
            panic!("unexpected conflict");
        };
        assert_eq!(id, seeded.id);
        assert_eq!(tier, ResolutionTier::Fuzzy);

        let comment = comments.read(&path).unwrap();
        let marker = IdentityMarker::parse(&comment).unwrap();
        assert_eq!(marker.id, seeded.id);
        assert_eq!(
            marker.extra.get("matched_from").and_then(|v| v.as_str()),
            Some("database")
        );
    }

    #[test]
    fn test_marker_path_conflict() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let comments = MemoryCommentStore::new();
        let path = touch(&dir, "dispute.zip", b"bytes-5");

        let path_id = ArchiveId::mint();
        db.insert_record(&ArchiveRecord::new(
            path_id.clone(),
            path.clone(),
            "dispute.zip",
            None,
            None,
        ))
        .unwrap();

        let marker_id = ArchiveId::mint();
        comments.write(&path, &IdentityMarker::new(marker_id.clone()).to_comment());

        let resolver = IdentityResolver::new(&db, &comments);
        let resolution = resolver.resolve(&path, None).unwrap();
        assert_eq!(
            resolution,
            Resolution::Conflict {
                marker_id,
                path_id,
            }
        );
    }

    #[derive(Debug)]
    struct NoopCommentStoreForTest;

    impl CommentStore for NoopCommentStoreForTest {
        fn read(&self, _path: &Path) -> Option<String> {
            None
        }

        fn write(&self, _path: &Path, _comment: &str) -> bool {
            false
        }
    }
}
