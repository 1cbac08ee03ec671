use anyhow::Result;
use std::path::PathBuf;

use nameset_core::schema::Database;
use nameset_engine::Config;

pub fn run_backup(config: &Config, dest: Option<PathBuf>) -> Result<()> {
    let dest = dest.unwrap_or_else(|| {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let mut name = config.database_path.as_os_str().to_owned();
        name.push(format!(".backup_{stamp}"));
        PathBuf::from(name)
    });

    let db = Database::open(&config.database_path)?;
    db.backup_to(&dest)?;
    println!("✓ Database backed up to {}", dest.display());

    Ok(())
}
