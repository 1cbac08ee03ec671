use anyhow::Result;
use std::path::Path;

use nameset_engine::{ArchiveRegistry, Config, Resolution};

use super::comment_store;

pub fn run_assign(config: &Config, file: &Path, artist: Option<&str>) -> Result<()> {
    if !file.exists() {
        println!("✗ File does not exist: {}", file.display());
        return Ok(());
    }

    let registry = ArchiveRegistry::open(&config.database_path, comment_store(config))?;

    if let Some(id) = registry.marker_id(file) {
        println!("⚠ Archive already carries id {id}");
        return Ok(());
    }

    match registry.assign(file, artist)? {
        Resolution::Resolved {
            id,
            tier,
            record_created,
        } => {
            println!("✓ Assigned id {id} (via {tier})");
            if record_created {
                println!("✓ Database record created");
            }
        }
        Resolution::Conflict { marker_id, path_id } => {
            println!("✗ Identity conflict: marker says {marker_id}, path recorded under {path_id}");
            println!("  Nothing was changed; resolve the conflict manually");
        }
    }

    Ok(())
}
