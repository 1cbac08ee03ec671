//! Path restoration on top of the nameset provenance store.
//!
//! Files get scattered by manual moves, sync tools, and recovery jobs.
//! This crate walks a directory, looks each archive up in the store (by
//! marker, by recorded path, or by its historical name), and moves it
//! back to the destination the history recorded. Every file yields a
//! typed [`RestoreOutcome`]; only store faults surface as hard errors.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod outcome;
pub mod restorer;

pub use outcome::{RestoreOutcome, RestoreStatus};
pub use restorer::{PathRestorer, RestoreOptions, SUPPORTED_EXTENSIONS};
