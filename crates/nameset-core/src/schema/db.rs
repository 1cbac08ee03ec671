use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{ArchiveRecord, HistoryEntry};
use crate::snapshot::{MetadataSnapshot, OperationContext, RawEvent};
use crate::ArchiveId;

use super::migrations::MIGRATIONS;

/// The provenance store: current state plus append-only history.
///
/// Every read-modify-append sequence runs as one transaction, so workers on
/// different files never observe partial writes. One handle per worker; the
/// handle is cheap to open.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

/// Aggregate counters for the `stats` surface.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_archives: i64,
    pub total_history: i64,
    /// `(artist_name, archive_count)`, most archives first.
    pub top_artists: Vec<(String, i64)>,
}

impl Database {
    /// Open (or create) a store at the given path and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Concurrent workers share the file; wait out writer locks instead
        // of failing with SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Open an in-memory store (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT version FROM schema_migrations ORDER BY version")?;
        let applied: Vec<u32> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        for migration in MIGRATIONS {
            if !applied.contains(&migration.version) {
                log::info!(
                    "Applying migration {} ({})",
                    migration.version,
                    migration.name
                );
                self.conn.execute_batch(migration.sql)?;
                // Concurrent opens of a fresh store can both reach here; the
                // DDL is idempotent and the ledger row must tolerate the
                // second writer.
                self.conn.execute(
                    "INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (?1, ?2)",
                    rusqlite::params![migration.version, migration.name],
                )?;
            }
        }

        Ok(())
    }
}

// Record CRUD
impl Database {
    /// Insert a new archive record.
    pub fn insert_record(&self, record: &ArchiveRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO archive_info (
                id, file_path, file_hash, current_name, artist_name,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.id.as_str(),
                record.file_path.to_string_lossy().as_ref(),
                record.file_hash,
                record.current_name,
                record.artist_name,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        log::info!("created record {} -> {}", record.id, record.current_name);
        Ok(())
    }

    /// Look up a record by identity token.
    pub fn get_record(&self, id: &ArchiveId) -> Result<Option<ArchiveRecord>> {
        fetch_record(&self.conn, id)
    }

    /// Exact-match lookup by last known path.
    pub fn get_record_by_path(&self, path: &Path) -> Result<Option<ArchiveRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path, file_hash, current_name, artist_name,
                    created_at, updated_at
             FROM archive_info WHERE file_path = ?1",
        )?;
        let record = stmt
            .query_row([path.to_string_lossy().as_ref()], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Lookup by content digest, for files moved entirely out of band.
    pub fn get_record_by_hash(&self, file_hash: &str) -> Result<Option<ArchiveRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_path, file_hash, current_name, artist_name,
                    created_at, updated_at
             FROM archive_info WHERE file_hash = ?1",
        )?;
        let record = stmt.query_row([file_hash], row_to_record).optional()?;
        Ok(record)
    }

    /// Fuzzy lookup over current and historical names, most recently updated
    /// first. Explicitly approximate; callers treat hits as best-effort.
    pub fn find_by_fuzzy_name(
        &self,
        name: &str,
        artist_name: Option<&str>,
    ) -> Result<Vec<ArchiveRecord>> {
        let pattern = format!("%{name}%");
        let mut sql = String::from(
            "SELECT DISTINCT ai.id, ai.file_path, ai.file_hash, ai.current_name,
                    ai.artist_name, ai.created_at, ai.updated_at
             FROM archive_info ai
             LEFT JOIN archive_history ah ON ai.id = ah.archive_id
             WHERE (ai.current_name LIKE ?1
                    OR ah.old_name LIKE ?1
                    OR ah.new_name LIKE ?1)",
        );
        if artist_name.is_some() {
            sql.push_str(" AND ai.artist_name = ?2");
        }
        sql.push_str(" ORDER BY ai.updated_at DESC, ai.id LIMIT 10");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = match artist_name {
            Some(artist) => stmt
                .query_map(rusqlite::params![pattern, artist], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
            None => stmt
                .query_map([pattern.as_str()], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(records)
    }

    /// Path-only sync after an out-of-band move. Appends no history.
    pub fn update_file_path(&self, id: &ArchiveId, new_path: &Path) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE archive_info SET file_path = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![
                id.as_str(),
                new_path.to_string_lossy().as_ref(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::NotFound {
                entity: "archive_info",
                id: id.to_string(),
            });
        }
        log::debug!("synced path {} -> {}", id, new_path.display());
        Ok(())
    }

    /// Remove records (and their history) whose recorded path no longer
    /// exists on disk. The only sanctioned deletion from the store.
    pub fn remove_missing(&mut self) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let orphaned: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id, file_path FROM archive_info")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut orphaned = Vec::new();
            for row in rows {
                let (id, file_path) = row?;
                if !Path::new(&file_path).exists() {
                    log::debug!("removing orphaned record {id} ({file_path})");
                    orphaned.push(id);
                }
            }
            orphaned
        };
        for id in &orphaned {
            tx.execute("DELETE FROM archive_history WHERE archive_id = ?1", [id])?;
            tx.execute("DELETE FROM archive_info WHERE id = ?1", [id])?;
        }
        tx.commit()?;
        Ok(orphaned.len())
    }

    /// Store-wide counters for the CLI `stats` command.
    pub fn stats(&self) -> Result<StoreStats> {
        let total_archives: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM archive_info", [], |row| row.get(0))?;
        let total_history: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM archive_history",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT artist_name, COUNT(*) FROM archive_info
             WHERE artist_name IS NOT NULL
             GROUP BY artist_name
             ORDER BY COUNT(*) DESC, artist_name
             LIMIT 10",
        )?;
        let top_artists = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;

        Ok(StoreStats {
            total_archives,
            total_history,
            top_artists,
        })
    }

    /// Snapshot the live store into a new database file.
    pub fn backup_to(&self, dest: &Path) -> Result<()> {
        self.conn.execute(
            "VACUUM INTO ?1",
            [dest.to_string_lossy().as_ref()],
        )?;
        log::info!("store backed up to {}", dest.display());
        Ok(())
    }
}

// History
impl Database {
    /// Record a (possibly no-op-named) event: advance the record's current
    /// name, fold the full provenance snapshot, and append one history row.
    /// Runs as a single transaction.
    pub fn update_current_name(
        &mut self,
        id: &ArchiveId,
        new_name: &str,
        old_name: Option<&str>,
        reason: &str,
        context: OperationContext,
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        let mut record = fetch_record(&tx, id)?.ok_or_else(|| Error::NotFound {
            entity: "archive_info",
            id: id.to_string(),
        })?;
        let old_name = old_name
            .map(String::from)
            .or_else(|| Some(record.current_name.clone()));

        let now = Utc::now();
        // The path moves with the name; both land in the same transaction
        // so a crash cannot leave them disagreeing.
        if let Some(path) = context.file_path.as_deref() {
            tx.execute(
                "UPDATE archive_info
                 SET current_name = ?2, file_path = ?3, updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id.as_str(), new_name, path, now.to_rfc3339()],
            )?;
            record.file_path = path.into();
        } else {
            tx.execute(
                "UPDATE archive_info SET current_name = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.as_str(), new_name, now.to_rfc3339()],
            )?;
        }
        record.current_name = new_name.to_string();
        record.updated_at = now;

        // Snapshot covers every event before this one; the new row embeds it.
        let prior = fetch_raw_events(&tx, id)?;
        let snapshot = MetadataSnapshot::fold(&record, &prior, context);
        let metadata_json = serde_json::to_string(&snapshot)?;

        tx.execute(
            "INSERT INTO archive_history
                (archive_id, old_name, new_name, reason, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                id.as_str(),
                old_name,
                new_name,
                reason,
                metadata_json,
                now.to_rfc3339(),
            ],
        )?;

        tx.commit()?;
        log::info!(
            "recorded event for {}: {} -> {}",
            id,
            old_name.as_deref().unwrap_or("(initial)"),
            new_name
        );
        Ok(())
    }

    /// Most recent history entries for an archive.
    pub fn get_history(&self, id: &ArchiveId, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, archive_id, old_name, new_name, reason, metadata, timestamp
             FROM archive_history
             WHERE archive_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(
                rusqlite::params![id.as_str(), limit as i64],
                row_to_history,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Exact-match lookup of history rows by the name an event produced.
    /// Newest first. The path restorer's entry point.
    pub fn find_history_by_new_name(&self, new_name: &str) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, archive_id, old_name, new_name, reason, metadata, timestamp
             FROM archive_history
             WHERE new_name = ?1
             ORDER BY timestamp DESC, id DESC",
        )?;
        let entries = stmt
            .query_map([new_name], row_to_history)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// The latest embedded snapshot for an archive, or one synthesized from
    /// raw rows when no history row carries one.
    pub fn get_complete_metadata(&self, id: &ArchiveId) -> Result<Option<MetadataSnapshot>> {
        let latest: Option<String> = self
            .conn
            .query_row(
                "SELECT metadata FROM archive_history
                 WHERE archive_id = ?1 AND metadata IS NOT NULL
                 ORDER BY timestamp DESC, id DESC
                 LIMIT 1",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(json) = latest {
            match serde_json::from_str(&json) {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => log::warn!("unparseable snapshot for {id}: {e}"),
            }
        }

        let Some(record) = fetch_record(&self.conn, id)? else {
            return Ok(None);
        };
        let prior = fetch_raw_events(&self.conn, id)?;
        Ok(Some(MetadataSnapshot::fold(
            &record,
            &prior,
            OperationContext::default(),
        )))
    }
}

fn parse_ts(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(Into::into)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ArchiveRecord> {
    let id: String = row.get(0)?;
    let file_path: String = row.get(1)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(ArchiveRecord {
        id: ArchiveId::new(id).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                "empty archive id".into(),
            )
        })?,
        file_path: file_path.into(),
        file_hash: row.get(2)?,
        current_name: row.get(3)?,
        artist_name: row.get(4)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_history(row: &rusqlite::Row) -> rusqlite::Result<HistoryEntry> {
    let archive_id: String = row.get(1)?;
    let metadata: Option<String> = row.get(5)?;
    let timestamp: String = row.get(6)?;

    let snapshot = metadata.as_deref().and_then(|json| {
        serde_json::from_str(json)
            .map_err(|e| log::warn!("unparseable history snapshot: {e}"))
            .ok()
    });

    Ok(HistoryEntry {
        id: row.get(0)?,
        archive_id: ArchiveId::new(archive_id).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                "empty archive id".into(),
            )
        })?,
        old_name: row.get(2)?,
        new_name: row.get(3)?,
        reason: row.get(4)?,
        snapshot,
        timestamp: parse_ts(&timestamp)?,
    })
}

fn fetch_record(conn: &Connection, id: &ArchiveId) -> Result<Option<ArchiveRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, file_path, file_hash, current_name, artist_name,
                created_at, updated_at
         FROM archive_info WHERE id = ?1",
    )?;
    let record = stmt.query_row([id.as_str()], row_to_record).optional()?;
    Ok(record)
}

fn fetch_raw_events(conn: &Connection, id: &ArchiveId) -> Result<Vec<RawEvent>> {
    let mut stmt = conn.prepare(
        "SELECT old_name, new_name, reason, metadata, timestamp
         FROM archive_history
         WHERE archive_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let events = stmt
        .query_map([id.as_str()], |row| {
            let metadata: Option<String> = row.get(3)?;
            let timestamp: String = row.get(4)?;
            Ok(RawEvent {
                old_name: row.get(0)?,
                new_name: row.get(1)?,
                reason: row.get(2)?,
                metadata: metadata
                    .as_deref()
                    .and_then(|json| serde_json::from_str(json).ok()),
                timestamp: parse_ts(&timestamp)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(name: &str, path: &str) -> ArchiveRecord {
        ArchiveRecord::new(
            ArchiveId::mint(),
            PathBuf::from(path),
            name,
            None,
            None,
        )
    }

    #[test]
    fn test_open_in_memory_applies_migrations() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_concurrent_open_on_fresh_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let barrier = std::sync::Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    Database::open(&path).map(|_| ())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_record_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let mut rec = record("raw001.zip", "/archives/raw001.zip");
        rec.artist_name = Some("X".to_string());
        rec.file_hash = Some("deadbeef".to_string());
        db.insert_record(&rec).unwrap();

        let by_id = db.get_record(&rec.id).unwrap().unwrap();
        assert_eq!(by_id, rec);

        let by_path = db
            .get_record_by_path(Path::new("/archives/raw001.zip"))
            .unwrap()
            .unwrap();
        assert_eq!(by_path.id, rec.id);

        let by_hash = db.get_record_by_hash("deadbeef").unwrap().unwrap();
        assert_eq!(by_hash.id, rec.id);
    }

    #[test]
    fn test_update_current_name_appends_history_and_snapshot() {
        let mut db = Database::open_in_memory().unwrap();
        let rec = record("raw001.zip", "/archives/raw001.zip");
        db.insert_record(&rec).unwrap();

        let ctx = OperationContext {
            file_path: Some("/archives/Final.zip".to_string()),
            operation_type: Some("rename".to_string()),
            ..Default::default()
        };
        db.update_current_name(&rec.id, "Final.zip", Some("raw001.zip"), "rename", ctx)
            .unwrap();

        let updated = db.get_record(&rec.id).unwrap().unwrap();
        assert_eq!(updated.current_name, "Final.zip");
        // The context path lands in the same transaction as the name.
        assert_eq!(updated.file_path, Path::new("/archives/Final.zip"));

        let history = db.get_history(&rec.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].old_name.as_deref(), Some("raw001.zip"));
        assert_eq!(history[0].new_name, "Final.zip");

        let snap = history[0].snapshot.as_ref().unwrap();
        assert_eq!(snap.basic_info.current_name.as_deref(), Some("Final.zip"));
        // The snapshot covers events before this one.
        assert_eq!(snap.statistics.total_operations, 0);
        assert_eq!(snap.recorded_path(), Some("/archives/Final.zip"));
    }

    #[test]
    fn test_second_rename_snapshot_covers_first() {
        let mut db = Database::open_in_memory().unwrap();
        let rec = record("A.zip", "/a/A.zip");
        db.insert_record(&rec).unwrap();

        db.update_current_name(&rec.id, "B.zip", None, "rename", OperationContext::default())
            .unwrap();
        db.update_current_name(&rec.id, "C.zip", None, "rename", OperationContext::default())
            .unwrap();

        let history = db.get_history(&rec.id, 10).unwrap();
        assert_eq!(history.len(), 2);
        // Newest first; old_name defaults to the record's name at the time.
        assert_eq!(history[0].old_name.as_deref(), Some("B.zip"));
        assert_eq!(history[1].old_name.as_deref(), Some("A.zip"));

        let snap = history[0].snapshot.as_ref().unwrap();
        assert_eq!(snap.statistics.total_operations, 1);
        assert_eq!(snap.name_history.len(), 1);
        assert_eq!(snap.name_history[0].from_name, "A.zip");
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let mut db = Database::open_in_memory().unwrap();
        let err = db
            .update_current_name(
                &ArchiveId::mint(),
                "x.zip",
                None,
                "rename",
                OperationContext::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_update_file_path_appends_no_history() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("a.zip", "/X/a.zip");
        db.insert_record(&rec).unwrap();

        db.update_file_path(&rec.id, Path::new("/Y/a.zip")).unwrap();

        let updated = db.get_record(&rec.id).unwrap().unwrap();
        assert_eq!(updated.file_path, PathBuf::from("/Y/a.zip"));
        assert_eq!(updated.current_name, "a.zip");
        assert!(db.get_history(&rec.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_fuzzy_find_matches_historical_names() {
        let mut db = Database::open_in_memory().unwrap();
        let rec = record("Original Title.zip", "/a/Original Title.zip");
        db.insert_record(&rec).unwrap();
        db.update_current_name(
            &rec.id,
            "Renamed.zip",
            None,
            "rename",
            OperationContext::default(),
        )
        .unwrap();

        // Matches the old name even though the record has moved on.
        let hits = db.find_by_fuzzy_name("Original Title", None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, rec.id);

        assert!(db.find_by_fuzzy_name("no such name", None).unwrap().is_empty());
    }

    #[test]
    fn test_fuzzy_find_artist_filter() {
        let db = Database::open_in_memory().unwrap();
        let mut a = record("Shared.zip", "/a/Shared.zip");
        a.artist_name = Some("X".to_string());
        let mut b = record("Shared.zip", "/b/Shared.zip");
        b.artist_name = Some("Y".to_string());
        db.insert_record(&a).unwrap();
        db.insert_record(&b).unwrap();

        let hits = db.find_by_fuzzy_name("Shared", Some("X")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, a.id);
    }

    #[test]
    fn test_find_history_by_new_name_exact() {
        let mut db = Database::open_in_memory().unwrap();
        let rec = record("a.zip", "/a/a.zip");
        db.insert_record(&rec).unwrap();
        db.update_current_name(&rec.id, "Final.zip", None, "rename", OperationContext::default())
            .unwrap();

        assert_eq!(db.find_history_by_new_name("Final.zip").unwrap().len(), 1);
        assert!(db.find_history_by_new_name("Final").unwrap().is_empty());
    }

    #[test]
    fn test_complete_metadata_synthesized_without_history() {
        let db = Database::open_in_memory().unwrap();
        let rec = record("a.zip", "/a/a.zip");
        db.insert_record(&rec).unwrap();

        let snap = db.get_complete_metadata(&rec.id).unwrap().unwrap();
        assert_eq!(snap.basic_info.current_name.as_deref(), Some("a.zip"));
        assert_eq!(snap.statistics.total_operations, 0);

        assert!(db
            .get_complete_metadata(&ArchiveId::mint())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stats_and_cleanup() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.zip");
        std::fs::write(&present, b"x").unwrap();

        let mut db = Database::open_in_memory().unwrap();
        let mut kept = record("present.zip", present.to_str().unwrap());
        kept.artist_name = Some("X".to_string());
        let gone = record("gone.zip", "/no/such/gone.zip");
        db.insert_record(&kept).unwrap();
        db.insert_record(&gone).unwrap();
        db.update_current_name(&gone.id, "gone2.zip", None, "rename", OperationContext::default())
            .unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_archives, 2);
        assert_eq!(stats.total_history, 1);
        assert_eq!(stats.top_artists, vec![("X".to_string(), 1)]);

        let removed = db.remove_missing().unwrap();
        assert_eq!(removed, 1);
        assert!(db.get_record(&gone.id).unwrap().is_none());
        assert!(db.get_history(&gone.id, 10).unwrap().is_empty());
        assert!(db.get_record(&kept.id).unwrap().is_some());
    }

    #[test]
    fn test_backup_to_creates_valid_store() {
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let rec = record("a.zip", "/a/a.zip");
        db.insert_record(&rec).unwrap();

        let dest = dir.path().join("backup.db");
        db.backup_to(&dest).unwrap();

        let restored = Database::open(&dest).unwrap();
        assert!(restored.get_record(&rec.id).unwrap().is_some());
    }
}
