//! Bounded-concurrency batch rename runner.
//!
//! Each job runs on the blocking pool with its own store handle; the
//! semaphore caps how many run at once. A shared cancel flag is checked
//! before each job starts, so an in-flight file always finishes cleanly.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::comment::CommentStore;
use crate::registry::{ArchiveRegistry, RenameOutcome, RenameStatus};

/// One rename request for the batch runner.
#[derive(Debug, Clone)]
pub struct RenameJob {
    pub path: PathBuf,
    pub new_name: String,
    pub artist: Option<String>,
}

/// What a batch run produced: per-file outcomes plus whether the run was
/// cut short by cancellation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<(PathBuf, RenameOutcome)>,
    pub cancelled: bool,
}

impl BatchReport {
    #[must_use]
    pub fn count(&self, status: &RenameStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.status == *status)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> impl Iterator<Item = &(PathBuf, RenameOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.succeeded())
    }
}

#[derive(Debug)]
pub struct BatchRunner {
    db_path: PathBuf,
    comments: Arc<dyn CommentStore>,
    worker_count: usize,
    cancel: Arc<AtomicBool>,
}

impl BatchRunner {
    #[must_use]
    pub fn new(
        db_path: impl Into<PathBuf>,
        comments: Arc<dyn CommentStore>,
        worker_count: usize,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            comments,
            worker_count: worker_count.max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between files; set it to stop scheduling new jobs.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run all jobs, at most `worker_count` at a time. Job failures land in
    /// the report as outcomes; only worker panics are dropped (and logged).
    pub async fn run(&self, jobs: Vec<RenameJob>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let semaphore = Arc::clone(&semaphore);
            let cancel = Arc::clone(&self.cancel);
            let comments = Arc::clone(&self.comments);
            let db_path = self.db_path.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                if cancel.load(Ordering::SeqCst) {
                    log::debug!("batch cancelled, skipping {}", job.path.display());
                    return None;
                }
                let joined = tokio::task::spawn_blocking(move || {
                    let outcome = match ArchiveRegistry::open(&db_path, comments) {
                        Ok(mut registry) => registry.process_rename(
                            &job.path,
                            &job.new_name,
                            job.artist.as_deref(),
                        ),
                        Err(e) => RenameOutcome {
                            status: RenameStatus::StoreFailed,
                            archive_id: None,
                            new_path: None,
                            message: e.to_string(),
                        },
                    };
                    (job.path, outcome)
                })
                .await;
                match joined {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        log::error!("batch worker failed: {e}");
                        None
                    }
                }
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(pair)) => report.outcomes.push(pair),
                Ok(None) => {}
                Err(e) => log::error!("batch task failed: {e}"),
            }
        }
        report.cancelled = self.cancel.load(Ordering::SeqCst);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::NoopCommentStore;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(bytes)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_batch_renames_all_files() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("store.db");
        let jobs: Vec<RenameJob> = (0..6)
            .map(|i| RenameJob {
                path: write_file(&dir, &format!("raw{i}.zip"), format!("payload-{i}").as_bytes()),
                new_name: format!("Final{i}.zip"),
                artist: None,
            })
            .collect();

        let runner = BatchRunner::new(&db_path, Arc::new(NoopCommentStore), 3);
        let report = runner.run(jobs).await;

        assert!(!report.cancelled);
        assert_eq!(report.outcomes.len(), 6);
        assert_eq!(report.count(&RenameStatus::Renamed), 6);
        for i in 0..6 {
            assert!(dir.path().join(format!("Final{i}.zip")).exists());
        }
    }

    #[tokio::test]
    async fn test_missing_files_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("store.db");
        let present = write_file(&dir, "here.zip", b"payload");
        let jobs = vec![
            RenameJob {
                path: present,
                new_name: "Renamed.zip".to_string(),
                artist: None,
            },
            RenameJob {
                path: dir.path().join("gone.zip"),
                new_name: "Whatever.zip".to_string(),
                artist: None,
            },
        ];

        let runner = BatchRunner::new(&db_path, Arc::new(NoopCommentStore), 2);
        let report = runner.run(jobs).await;

        assert_eq!(report.count(&RenameStatus::Renamed), 1);
        assert_eq!(report.count(&RenameStatus::MissingFile), 1);
        assert_eq!(report.failed().count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_run_skips_everything() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("store.db");
        let path = write_file(&dir, "untouched.zip", b"payload");
        let jobs = vec![RenameJob {
            path: path.clone(),
            new_name: "Touched.zip".to_string(),
            artist: None,
        }];

        let runner = BatchRunner::new(&db_path, Arc::new(NoopCommentStore), 2);
        runner.cancel_flag().store(true, Ordering::SeqCst);
        let report = runner.run(jobs).await;

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert!(path.exists());
    }
}
