//! Error type shared by the core model and the provenance store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// SQLite-level failure from the provenance store.
    #[error("store error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot or marker payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A store operation addressed a row that does not exist.
    #[error("not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, Error>;
