use anyhow::Result;

use nameset_engine::{ArchiveRegistry, Config};

use super::comment_store;

pub fn run_search(config: &Config, query: &str, artist: Option<&str>) -> Result<()> {
    let registry = ArchiveRegistry::open(&config.database_path, comment_store(config))?;

    println!("\n🔍 Search: {query}");
    if let Some(artist) = artist {
        println!("  Artist filter: {artist}");
    }

    let results = registry.search(query, artist)?;
    if results.is_empty() {
        println!("\n  No matching records");
        return Ok(());
    }

    for (i, record) in results.iter().enumerate() {
        println!("\n  {}. {}", i + 1, record.current_name);
        println!("     ID: {}", record.id);
        println!(
            "     Artist: {}",
            record.artist_name.as_deref().unwrap_or("(unknown)")
        );
        println!(
            "     Created: {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
