//! Identity resolution and rename orchestration.
//!
//! This crate combines the provenance store with an external comment
//! capability to keep one durable identity per archive across arbitrary
//! renames and moves: the multi-tier [`resolver::IdentityResolver`], the
//! [`registry::ArchiveRegistry`] orchestrator, the bounded
//! [`batch::BatchRunner`], and the supporting comment-store and
//! structure-inspector abstractions.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod batch;
pub mod comment;
pub mod config;
pub mod error;
pub mod inspect;
pub mod registry;
pub mod resolver;

pub use batch::{BatchReport, BatchRunner, RenameJob};
pub use comment::{CommentStore, MemoryCommentStore, NoopCommentStore, ToolCommentStore};
pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use inspect::{
    ArchiveStructure, ArchiveStructureInspector, NoopStructureInspector, ToolStructureInspector,
};
pub use registry::{ArchiveRegistry, RenameOutcome, RenameStatus};
pub use resolver::{IdentityResolver, Resolution, ResolutionTier};
