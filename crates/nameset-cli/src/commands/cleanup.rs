use anyhow::Result;

use nameset_core::schema::Database;
use nameset_engine::Config;

pub fn run_cleanup(config: &Config) -> Result<()> {
    println!("🧹 Cleaning up orphaned records...");

    let mut db = Database::open(&config.database_path)?;
    let removed = db.remove_missing()?;

    println!("✓ Removed {removed} records for missing files");

    Ok(())
}
