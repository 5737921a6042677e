use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("persisted state I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("persisted state file name is not a valid key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to encode envelope for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
