use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for nameset.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (NAMESET_* prefix)
/// 3. Config file (~/.config/nameset/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: NAMESET_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/nameset/archives.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// External archiver used to read archive comments and listings.
    ///
    /// Can be set via:
    /// - ENV: NAMESET_COMMENT_TOOL
    /// - Config: comment_tool = "7z"
    #[serde(default = "default_comment_tool")]
    pub comment_tool: String,

    /// External tool used to write archive comments. Some archivers can
    /// list comments but not set them, so the write side is configured
    /// separately. `None` leaves archives untouched on write.
    pub comment_write_tool: Option<String>,

    /// Filename extensions treated as archives when scanning directories.
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,

    /// Number of concurrent workers in batch runs.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            comment_tool: default_comment_tool(),
            comment_write_tool: None,
            archive_extensions: default_archive_extensions(),
            worker_count: default_worker_count(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/nameset/config.toml
    /// Reads environment variables with NAMESET_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new()
            .context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("nameset");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration with a custom database path, for the --db flag.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// Whether `path` carries one of the configured archive extensions.
    #[must_use]
    pub fn is_archive(&self, path: &std::path::Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| {
                self.archive_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(&ext))
            })
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/nameset/archives.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nameset")
        .join("archives.db")
}

fn default_comment_tool() -> String {
    "7z".to_string()
}

fn default_archive_extensions() -> Vec<String> {
    vec!["zip".to_string(), "rar".to_string(), "7z".to_string()]
}

fn default_worker_count() -> usize {
    4
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/nameset/config.toml
/// - macOS: ~/Library/Application Support/nameset/config.toml
/// - Windows: %APPDATA%\nameset\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nameset")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# NameSet Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (NAMESET_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Path to the SQLite database holding archive identities and rename history
#
# Can also be set via:
# - CLI: nameset --db /custom/path.db info archive.zip
# - Environment: NAMESET_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/archives.db"

# External archiver used to read archive comments and listings
#comment_tool = "7z"

# External tool used to write archive comments, if different from the reader
#comment_write_tool = "7z"

# Filename extensions treated as archives when scanning directories
#archive_extensions = ["zip", "rar", "7z"]

# Number of concurrent workers in batch runs
#worker_count = 4
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config())
        .context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert_eq!(config.comment_tool, "7z");
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.archive_extensions, vec!["zip", "rar", "7z"]);
    }

    #[test]
    fn test_config_with_custom_db_path() {
        let custom_path = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_db_path(custom_path.clone());
        assert!(config.is_ok());
        assert_eq!(config.unwrap().database_path, custom_path);
    }

    #[test]
    fn test_is_archive_matches_case_insensitively() {
        let config = Config::default();
        assert!(config.is_archive(Path::new("a.zip")));
        assert!(config.is_archive(Path::new("b.RAR")));
        assert!(!config.is_archive(Path::new("c.txt")));
        assert!(!config.is_archive(Path::new("noext")));
    }
}
