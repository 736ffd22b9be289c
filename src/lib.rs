//! Selfscape: turns a personal social-media data export into named datasets.
//!
//! The library walks an export's JSON tree, flattens every file into rows,
//! merges files that resolve to the same dataset name, and materializes each
//! dataset to a backing store that downstream analysis code queries by name.

#![warn(missing_docs)]

pub mod audit;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod enumerate;
pub mod error;
pub mod flatten;
pub mod ingest;
pub mod progress;
pub mod resolve;
pub mod shape;
pub mod store;
pub mod telemetry;

/// Re-export common error types for convenience.
pub use error::{IngestError, Result};

/// Re-export the entry points most callers need.
pub use ingest::{ingest, Ingestor, Reader};

/// Selfscape version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
