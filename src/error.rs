//! Selfscape error types.
//!
//! All errors are typed and provide root cause information. Per-file
//! failures (parse, timeout) are separated from structural failures so the
//! ingest loop can skip a file without aborting the run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Selfscape operations.
#[derive(Error, Debug)]
pub enum IngestError {
    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The input root handed to the enumerator does not exist.
    #[error("Input root not found: {path}")]
    RootNotFound {
        /// The missing root directory.
        path: PathBuf,
    },

    /// No dataset was produced under this name.
    #[error("Dataset not found: {0}")]
    UnknownDataset(String),

    /// A JSON file could not be parsed.
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// The file that failed to parse.
        file: PathBuf,
        /// The parse error message.
        message: String,
    },

    /// Flattening a file ran past its deadline.
    #[error("Flattening {file} exceeded {limit:?}")]
    Timeout {
        /// The file being flattened.
        file: PathBuf,
        /// The configured limit.
        limit: Duration,
    },

    /// The reader was used after `close()`.
    #[error("Reader is closed")]
    Closed,

    /// A backing artifact could not be encoded, decoded or verified.
    #[error("Artifact error for {path}: {message}")]
    Artifact {
        /// The artifact file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Invalid ingest options.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// The validation error message.
        message: String,
    },

    /// Directory traversal failed below the root.
    #[error("Failed to walk {path}: {message}")]
    Walk {
        /// The entry that could not be read.
        path: PathBuf,
        /// The traversal error message.
        message: String,
    },

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl IngestError {
    /// True for the "nothing by that name" family: a missing input root or an
    /// unknown dataset. Feature code catches these and skips itself.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IngestError::RootNotFound { .. } | IngestError::UnknownDataset(_)
        )
    }

    /// True for failures scoped to a single input file.
    pub fn is_per_file(&self) -> bool {
        matches!(self, IngestError::Parse { .. } | IngestError::Timeout { .. })
    }

    /// Short reason label used in skip summaries.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Io { .. } => "io",
            IngestError::RootNotFound { .. } | IngestError::UnknownDataset(_) => "not-found",
            IngestError::Parse { .. } => "parse",
            IngestError::Timeout { .. } => "timeout",
            IngestError::Closed => "closed",
            IngestError::Artifact { .. } => "artifact",
            IngestError::InvalidConfig { .. } => "config",
            IngestError::Walk { .. } => "walk",
            IngestError::Other(_) => "other",
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

/// Result type alias for Selfscape operations.
pub type Result<T> = std::result::Result<T, IngestError>;
