//! Error types for taskpool-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or saving the task pool config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load.
    #[error("failed to parse config at {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse error on load.
    #[error("failed to parse config at {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Serialization failure on save.
    #[error("failed to serialize config: {0}")]
    Serialize(String),

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.taskpool/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `remove_task` was given an index past the end of the task list.
    #[error("no task at index {index} (pool has {len} task(s))")]
    NoSuchTask { index: usize, len: usize },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
