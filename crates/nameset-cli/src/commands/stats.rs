use anyhow::Result;

use nameset_core::schema::Database;
use nameset_engine::Config;

pub fn show_stats(config: &Config) -> Result<()> {
    let db = Database::open(&config.database_path)?;
    let stats = db.stats()?;

    println!("\n📊 NameSet Statistics\n");
    println!("  Database: {}", config.database_path.display());
    println!("  Archives: {}", stats.total_archives);
    println!("  History records: {}", stats.total_history);

    if !stats.top_artists.is_empty() {
        println!("\n  Top artists:");
        for (name, count) in stats.top_artists.iter().take(5) {
            println!("    {name}: {count} archives");
        }
    }

    Ok(())
}
