use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("corrupt store {path}: {source}")]
    CorruptStore {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("migration setup failed: {0}")]
    SetupFatal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialise store: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Dataset(#[from] lexcheck_core::DatasetError),
}
