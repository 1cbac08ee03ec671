use anyhow::Result;
use std::path::Path;

use nameset_core::model::base_name;
use nameset_engine::{
    ArchiveRegistry, ArchiveStructureInspector, Config, ToolStructureInspector,
};

use super::comment_store;

pub fn show_info(config: &Config, file: &Path, metadata: bool) -> Result<()> {
    if !file.exists() {
        println!("✗ File does not exist: {}", file.display());
        return Ok(());
    }

    let registry = ArchiveRegistry::open(&config.database_path, comment_store(config))?;

    println!("\n📦 {}\n", base_name(file));

    let Some(id) = registry.marker_id(file) else {
        println!("  ✗ No identity marker found");
        println!("  Run `nameset assign {}` to assign one", file.display());
        return Ok(());
    };
    println!("  ID: {id}");

    match registry.archive_info(&id)? {
        Some(record) => {
            println!("  Current name: {}", record.current_name);
            println!(
                "  Artist: {}",
                record.artist_name.as_deref().unwrap_or("(unknown)")
            );
            println!("  Created: {}", record.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Updated: {}", record.updated_at.format("%Y-%m-%d %H:%M:%S"));

            let history = registry.history(&id, 5)?;
            if !history.is_empty() {
                println!("\n  Recent history:");
                for entry in &history {
                    let old = entry.old_name.as_deref().unwrap_or("(initial)");
                    println!(
                        "    {}: {} -> {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        old,
                        entry.new_name
                    );
                    if let Some(reason) = &entry.reason {
                        println!("      Reason: {reason}");
                    }
                }
            }

            if metadata {
                if let Some(snapshot) = registry.complete_metadata(&id)? {
                    println!("\n  Metadata snapshot:");
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                }
            }
        }
        None => println!("  ⚠ No database record for this id"),
    }

    let inspector = ToolStructureInspector::new(config.comment_tool.clone());
    if let Some(structure) = inspector.inspect(file) {
        println!(
            "\n  Structure: {} files, {} directories",
            structure.file_count, structure.dir_count
        );
        match structure.single_root() {
            Some(root) => println!("  Single root: {root}/"),
            None => {
                for entry in structure.top_level.iter().take(10) {
                    println!("    {entry}");
                }
            }
        }
    }

    Ok(())
}
