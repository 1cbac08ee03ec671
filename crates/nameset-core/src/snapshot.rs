//! Denormalized provenance snapshots.
//!
//! Every history row carries a self-contained snapshot of the archive's
//! basic info, its full name and operation history so far, and derived
//! statistics. The redundancy is deliberate: one surviving row is enough to
//! reconstruct provenance after pruning or corruption of earlier rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ArchiveRecord;
use crate::ArchiveId;

/// Caller-supplied context for the operation being recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renamed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
}

/// Basic info block embedded in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub current_name: Option<String>,
    pub artist_name: Option<String>,
    pub file_path: Option<String>,
    pub file_hash: Option<String>,
}

/// One name change in the reconstructed history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameChange {
    #[serde(rename = "from")]
    pub from_name: String,
    #[serde(rename = "to")]
    pub to_name: String,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// One prior operation, with its own recorded metadata if it had any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    pub old_name: Option<String>,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Aggregate statistics over the operation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub total_operations: usize,
    pub total_renames: usize,
    pub unique_names: usize,
    pub first_operation: Option<DateTime<Utc>>,
    pub last_operation: Option<DateTime<Utc>>,
}

/// A complete point-in-time provenance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub archive_id: ArchiveId,
    pub first_created_at: Option<DateTime<Utc>>,
    #[serde(rename = "current_timestamp")]
    pub captured_at: DateTime<Utc>,
    pub basic_info: BasicInfo,
    pub name_history: Vec<NameChange>,
    pub operation_history: Vec<OperationRecord>,
    pub current_operation: OperationContext,
    pub statistics: SnapshotStats,
}

/// A raw prior event as read back from the history table, before folding.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub old_name: Option<String>,
    pub new_name: String,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl MetadataSnapshot {
    /// Fold the record's current state plus every prior event into one
    /// self-contained snapshot. Prior events must be in ascending timestamp
    /// order and must not include the event being recorded.
    ///
    /// O(history length) per call; accepted cost for indestructible
    /// provenance.
    #[must_use]
    pub fn fold(
        record: &ArchiveRecord,
        prior: &[RawEvent],
        current_operation: OperationContext,
    ) -> Self {
        let mut name_history = Vec::new();
        let mut operation_history = Vec::with_capacity(prior.len());

        for event in prior {
            if let Some(old) = &event.old_name {
                if old != &event.new_name {
                    name_history.push(NameChange {
                        from_name: old.clone(),
                        to_name: event.new_name.clone(),
                        timestamp: event.timestamp,
                        reason: event.reason.clone(),
                    });
                }
            }
            operation_history.push(OperationRecord {
                timestamp: event.timestamp,
                reason: event.reason.clone(),
                old_name: event.old_name.clone(),
                new_name: event.new_name.clone(),
                metadata: event.metadata.clone(),
            });
        }

        let statistics = SnapshotStats {
            total_operations: prior.len(),
            total_renames: name_history.len(),
            unique_names: {
                let mut names: Vec<&str> =
                    prior.iter().map(|e| e.new_name.as_str()).collect();
                names.sort_unstable();
                names.dedup();
                names.len()
            },
            first_operation: prior.first().map(|e| e.timestamp),
            last_operation: prior.last().map(|e| e.timestamp),
        };

        Self {
            archive_id: record.id.clone(),
            first_created_at: Some(record.created_at),
            captured_at: Utc::now(),
            basic_info: BasicInfo {
                current_name: Some(record.current_name.clone()),
                artist_name: record.artist_name.clone(),
                file_path: Some(record.file_path.to_string_lossy().into_owned()),
                file_hash: record.file_hash.clone(),
            },
            name_history,
            operation_history,
            current_operation,
            statistics,
        }
    }

    /// The path recorded for the operation this snapshot was taken for,
    /// falling back to the basic-info path. Used by the path restorer.
    #[must_use]
    pub fn recorded_path(&self) -> Option<&str> {
        self.current_operation
            .file_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| {
                self.basic_info
                    .file_path
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
            })
    }
}
