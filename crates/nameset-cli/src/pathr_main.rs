use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use nameset_engine::{CommentStore, Config, ToolCommentStore};
use pathr::{PathRestorer, RestoreOptions, RestoreOutcome, RestoreStatus, SUPPORTED_EXTENSIONS};

#[derive(Debug, Parser)]
#[command(name = "pathr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/nameset/archives.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Restore every archive under a directory to its recorded path
    ///
    /// Walks the directory, looks each archive up in the rename history,
    /// and plans a move back to the recorded destination. Without
    /// --execute this is a preview; nothing is touched.
    Restore {
        /// Directory containing misplaced files
        source: PathBuf,
        /// Execute the moves; default only previews
        #[arg(long)]
        execute: bool,
        /// Do not recurse into subdirectories
        #[arg(long)]
        no_recursive: bool,
        /// Extension to include, repeatable (default: zip, rar, 7z)
        #[arg(long = "ext")]
        extensions: Vec<String>,
        /// Preview, then pick which planned moves to execute
        #[arg(long)]
        interactive: bool,
    },
    /// Restore a single file
    File {
        /// Path to the misplaced file
        file: PathBuf,
        /// Execute the move; default only previews
        #[arg(long)]
        execute: bool,
        /// Preview, then confirm before moving
        #[arg(long)]
        interactive: bool,
    },
}

fn comment_store(config: &Config) -> Arc<dyn CommentStore> {
    Arc::new(ToolCommentStore::new(
        config.comment_tool.clone(),
        config.comment_write_tool.clone(),
    ))
}

fn normalize_extensions(raw: &[String]) -> Option<Vec<String>> {
    let normalized: Vec<String> = raw
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();
    if normalized.is_empty() {
        Some(
            SUPPORTED_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    } else {
        Some(normalized)
    }
}

fn status_symbol(status: RestoreStatus) -> &'static str {
    match status {
        RestoreStatus::Moved | RestoreStatus::Aligned => "✓",
        RestoreStatus::Planned => "⏳",
        RestoreStatus::Skipped => "⚠",
        _ => "✗",
    }
}

fn print_summary(outcomes: &[RestoreOutcome]) {
    if outcomes.is_empty() {
        println!("\n  No files examined");
        return;
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for outcome in outcomes {
        *counts.entry(outcome.status.to_string()).or_default() += 1;
    }
    println!("\n📊 Summary");
    for (status, count) in &counts {
        println!("  {status:<10} {count}");
    }

    let problems: Vec<&RestoreOutcome> = outcomes
        .iter()
        .filter(|o| o.status.is_problem() || o.status == RestoreStatus::Skipped)
        .collect();
    if !problems.is_empty() {
        println!("\n⚠ Needs attention:");
        for outcome in problems.iter().take(20) {
            println!(
                "  [{}] {}: {}",
                outcome.status,
                outcome.source_path.display(),
                outcome.message
            );
        }
        if problems.len() > 20 {
            println!("  ... and {} more", problems.len() - 20);
        }
    }
}

fn print_outcome(outcome: &RestoreOutcome) {
    println!(
        "{} {}: {}",
        status_symbol(outcome.status),
        outcome.status,
        outcome.message
    );
    if let Some(target) = &outcome.target_path {
        println!("  Target: {}", target.display());
    }
    if let Some(id) = &outcome.archive_id {
        println!("  Archive ID: {id}");
    }
    if let Some(history_id) = outcome.history_id {
        println!("  History row: {history_id}");
    }
}

/// Ask which of `valid` indices to move. Accepts `all`, `none`, or a
/// comma-separated list; re-prompts on bad input.
fn prompt_selection(valid: &[usize]) -> Result<Vec<usize>> {
    let stdin = io::stdin();
    loop {
        print!("Indices to move [all/none/e.g. 1,3]: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(Vec::new());
        }
        let raw = line.trim().to_lowercase();
        match raw.as_str() {
            "" | "all" | "a" | "*" => return Ok(valid.to_vec()),
            "none" | "n" | "0" => return Ok(Vec::new()),
            _ => {}
        }
        let parsed: Option<Vec<usize>> = raw
            .replace(';', ",")
            .split(',')
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .map(|chunk| {
                chunk
                    .parse::<usize>()
                    .ok()
                    .filter(|index| valid.contains(index))
            })
            .collect();
        match parsed {
            Some(mut indices) => {
                indices.sort_unstable();
                indices.dedup();
                return Ok(indices);
            }
            None => println!("Invalid input; choose from {valid:?}"),
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [Y/n]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}

fn interactive_restore(restorer: &PathRestorer, outcomes: &[RestoreOutcome]) -> Result<()> {
    let planned: Vec<(usize, &RestoreOutcome)> = outcomes
        .iter()
        .filter(|o| o.status == RestoreStatus::Planned)
        .enumerate()
        .map(|(i, o)| (i + 1, o))
        .collect();

    if planned.is_empty() {
        println!("\n✓ Nothing to move; files are aligned or lack a target");
        return Ok(());
    }

    println!("\n⏳ Planned moves:");
    for (index, outcome) in &planned {
        let target = outcome
            .target_path
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string());
        println!("  {index}. {} -> {target}", outcome.source_path.display());
    }

    let valid: Vec<usize> = planned.iter().map(|(index, _)| *index).collect();
    let selected = prompt_selection(&valid)?;
    if selected.is_empty() {
        println!("Nothing selected; no files moved");
        return Ok(());
    }
    if !confirm("Move the selected files?")? {
        println!("Cancelled; no files moved");
        return Ok(());
    }

    let mut results = Vec::new();
    for (index, outcome) in &planned {
        if !selected.contains(index) {
            continue;
        }
        let result = restorer.restore_file(&outcome.source_path, false)?;
        print_outcome(&result);
        results.push(result);
    }
    print_summary(&results);
    Ok(())
}

fn main() -> Result<()> {
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

    let restorer = PathRestorer::open(&config.database_path, comment_store(&config))?;

    match cli.command {
        Commands::Restore {
            source,
            execute,
            no_recursive,
            extensions,
            interactive,
        } => {
            let options = RestoreOptions {
                recursive: !no_recursive,
                extensions: normalize_extensions(&extensions),
                // Interactive mode previews first and moves per selection.
                dry_run: interactive || !execute,
            };
            let outcomes = restorer.restore_directory(&source, &options, |outcome| {
                println!(
                    "{} [{}] {}",
                    status_symbol(outcome.status),
                    outcome.status,
                    outcome.source_path.display()
                );
            });
            print_summary(&outcomes);

            if interactive {
                interactive_restore(&restorer, &outcomes)?;
            } else if !execute {
                println!("\nRe-run with --execute to perform the moves");
            }
        }
        Commands::File {
            file,
            execute,
            interactive,
        } => {
            let mut outcome = restorer.restore_file(&file, !execute || interactive)?;

            if interactive && outcome.status == RestoreStatus::Planned {
                print_outcome(&outcome);
                if confirm("Perform this move?")? {
                    outcome = restorer.restore_file(&file, false)?;
                } else {
                    println!("Cancelled; file not moved");
                }
            }

            print_outcome(&outcome);
            if outcome.status == RestoreStatus::Planned && !execute && !interactive {
                println!("\nRe-run with --execute to perform the move");
            }
        }
    }

    Ok(())
}
