//! Error types for taskpool-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can abort a sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source and destination disagree on file vs. directory at `relative`
    /// (empty for the destination root), and force mode is off.
    #[error("conflict at path {}: file/directory mismatch with destination (enable force copy to replace it)", crate::engine::display_relative(.relative))]
    Conflict {
        relative: PathBuf,
        destination: PathBuf,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory walk itself failed below `root`.
    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The run was cancelled between two files.
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
