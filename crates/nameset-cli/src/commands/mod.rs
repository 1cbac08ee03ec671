use std::sync::Arc;

use nameset_engine::{CommentStore, Config, ToolCommentStore};

pub mod assign;
pub mod backup;
pub mod cleanup;
pub mod info;
pub mod process;
pub mod search;
pub mod stats;

pub use assign::run_assign;
pub use backup::run_backup;
pub use cleanup::run_cleanup;
pub use info::show_info;
pub use process::run_process;
pub use search::run_search;
pub use stats::show_stats;

/// Comment store wired to the configured external archiver.
pub(crate) fn comment_store(config: &Config) -> Arc<dyn CommentStore> {
    Arc::new(ToolCommentStore::new(
        config.comment_tool.clone(),
        config.comment_write_tool.clone(),
    ))
}
