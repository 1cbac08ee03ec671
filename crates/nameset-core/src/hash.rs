//! Content hashing for the hash resolution tier.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Chunk size for streaming reads.
const CHUNK_SIZE: usize = 8192;

/// Compute the hex-encoded SHA-256 digest of a file's bytes.
///
/// Pure function over the file contents; holds no locks and keeps memory
/// bounded by reading in fixed-size chunks.
pub fn content_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Like [`content_hash`] but logs and swallows failures. The hash tier is
/// best-effort; a vanished or unreadable file just means a tier miss.
#[must_use]
pub fn try_content_hash(path: &Path) -> Option<String> {
    match content_hash(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            log::warn!("failed to hash {}: {}", path.display(), e);
            None
        }
    }
}
