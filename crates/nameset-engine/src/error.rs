//! Engine-boundary error type.

use thiserror::Error;

/// Errors crossing the resolution and orchestration boundary.
///
/// "Not found", "ambiguous", conflicts, and per-file rename failures are
/// typed results on the operations that produce them; only provenance store
/// faults propagate as errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An error propagated from the provenance store.
    #[error("store error: {0}")]
    Store(#[from] nameset_core::Error),
}

/// Convenience alias for engine results.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
