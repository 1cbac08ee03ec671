//! Core domain model for nameset.
//!
//! This crate defines the archive identity token, the provenance data
//! model (records, history entries, metadata snapshots), the comment
//! marker codec, content hashing, and the SQLite provenance store.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod hash;
pub mod marker;
pub mod model;
pub mod schema;
pub mod snapshot;

pub use error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a freshly minted identity token.
pub const ID_LENGTH: usize = 12;

const ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Opaque, URL-safe identity token for an archive.
///
/// Minted once when an archive is first seen and never changed afterwards,
/// no matter how often the physical file is renamed or moved. Tokens read
/// back from foreign markers are accepted as-is, so the inner string is not
/// required to be exactly [`ID_LENGTH`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(String);

impl ArchiveId {
    /// Wrap an existing token. Returns `None` for empty or whitespace-only
    /// input.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Mint a new random token of [`ID_LENGTH`] URL-safe characters.
    #[must_use]
    pub fn mint() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let token: String = (0..ID_LENGTH)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ArchiveId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
