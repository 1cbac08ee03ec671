//! SQLite persistence: the provenance store and its migrations.

mod db;
mod migrations;

pub use db::{Database, StoreStats};
pub use migrations::{Migration, MIGRATIONS};
