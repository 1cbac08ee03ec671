use std::fmt;
use std::path::PathBuf;

use nameset_core::ArchiveId;

/// What happened to one file during restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestoreStatus {
    /// Source file does not exist.
    Missing,
    /// No tier produced an identity for the file.
    NoMatch,
    /// The historical name maps to more than one archive id.
    Ambiguous,
    /// Identity found but no destination is recorded anywhere.
    NoTarget,
    /// File already sits at the recorded destination; store path synced.
    Aligned,
    /// Dry run: the move that would happen.
    Planned,
    /// Destination occupied by another file; nothing moved.
    Skipped,
    /// File moved to the recorded destination and the store updated.
    Moved,
    /// The move itself failed; the store is untouched.
    Error,
}

impl RestoreStatus {
    /// Statuses that need operator attention.
    #[must_use]
    pub fn is_problem(self) -> bool {
        matches!(
            self,
            Self::Missing | Self::NoMatch | Self::Ambiguous | Self::NoTarget | Self::Error
        )
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Missing => "missing",
            Self::NoMatch => "no-match",
            Self::Ambiguous => "ambiguous",
            Self::NoTarget => "no-target",
            Self::Aligned => "aligned",
            Self::Planned => "planned",
            Self::Skipped => "skipped",
            Self::Moved => "moved",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Result of attempting to restore a single file's path.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub source_path: PathBuf,
    pub archive_id: Option<ArchiveId>,
    pub target_path: Option<PathBuf>,
    pub status: RestoreStatus,
    pub message: String,
    /// History row the destination came from, when the history tier won.
    pub history_id: Option<i64>,
}

impl RestoreOutcome {
    pub(crate) fn terminal(
        source_path: PathBuf,
        status: RestoreStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_path,
            archive_id: None,
            target_path: None,
            status,
            message: message.into(),
            history_id: None,
        }
    }
}
