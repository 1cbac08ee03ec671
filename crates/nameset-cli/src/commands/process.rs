use anyhow::Result;
use std::path::Path;

use nameset_engine::{ArchiveRegistry, Config, RenameStatus};

use super::comment_store;

pub fn run_process(
    config: &Config,
    file: &Path,
    new_name: &str,
    artist: Option<&str>,
) -> Result<()> {
    let mut registry = ArchiveRegistry::open(&config.database_path, comment_store(config))?;
    let outcome = registry.process_rename(file, new_name, artist);

    match outcome.status {
        RenameStatus::Renamed => {
            let id = outcome
                .archive_id
                .map_or_else(|| "?".to_string(), |id| id.to_string());
            println!("✓ Renamed to {new_name} (ID: {id})");
        }
        RenameStatus::Unchanged => {
            println!("✓ Name already correct; identity ensured");
        }
        RenameStatus::MissingFile => {
            println!("✗ File does not exist: {}", file.display());
        }
        RenameStatus::Conflict => {
            println!("✗ Identity conflict: {}", outcome.message);
        }
        RenameStatus::RenameFailed => {
            println!("✗ Rename failed: {}", outcome.message);
        }
        RenameStatus::StoreFailed => {
            println!("✗ Database update failed: {}", outcome.message);
            if let Some(id) = outcome.archive_id {
                println!("  The file keeps id {id}; re-run to retry the record");
            }
        }
    }

    Ok(())
}
