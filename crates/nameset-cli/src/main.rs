use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use nameset_engine::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "nameset", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/nameset/archives.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Show an archive's identity, record, and recent history
    ///
    /// Reads the identity marker embedded in the archive's comment, looks
    /// the id up in the database, and prints the current record plus the
    /// most recent rename history. When an external archiver is
    /// configured, also summarizes the archive's internal structure.
    Info {
        /// Path to the archive
        file: PathBuf,
        /// Also print the complete metadata snapshot as JSON
        #[arg(long)]
        metadata: bool,
    },
    /// Search records by current or historical name
    Search {
        /// Name fragment to search for
        query: String,
        /// Only match archives by this artist
        #[arg(long)]
        artist: Option<String>,
    },
    /// Show database statistics
    Stats,
    /// Assign an identity to an archive without renaming it
    ///
    /// Resolves the archive through the usual tiers (marker, recorded
    /// path, content hash, name history) and mints a fresh id only when
    /// nothing matches. The id is embedded in the archive's comment and
    /// recorded in the database.
    Assign {
        /// Path to the archive
        file: PathBuf,
        /// Artist to record on a newly created record
        #[arg(long)]
        artist: Option<String>,
    },
    /// Rename an archive and record the change under its durable id
    Process {
        /// Path to the archive
        file: PathBuf,
        /// New file name (not a path; the file stays in its directory)
        new_name: String,
        /// Artist to record with this operation
        #[arg(long)]
        artist: Option<String>,
    },
    /// Back up the database
    Backup {
        /// Destination file (default: alongside the database, timestamped)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Remove records whose files no longer exist
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.db {
        Some(db) => Config::load_with_db_path(db)?,
        None => Config::load()?,
    };

    // Ensure database directory exists
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match cli.command {
        Commands::Info { file, metadata } => {
            commands::show_info(&config, &file, metadata)?;
        }
        Commands::Search { query, artist } => {
            commands::run_search(&config, &query, artist.as_deref())?;
        }
        Commands::Stats => {
            commands::show_stats(&config)?;
        }
        Commands::Assign { file, artist } => {
            commands::run_assign(&config, &file, artist.as_deref())?;
        }
        Commands::Process {
            file,
            new_name,
            artist,
        } => {
            commands::run_process(&config, &file, &new_name, artist.as_deref())?;
        }
        Commands::Backup { path } => {
            commands::run_backup(&config, path)?;
        }
        Commands::Cleanup => {
            commands::run_cleanup(&config)?;
        }
    }

    Ok(())
}
