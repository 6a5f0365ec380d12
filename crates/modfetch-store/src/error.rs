use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open store at {path}: {source}")]
    Open { path: PathBuf, source: sled::Error },

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("backup failed: {0}")]
    Backup(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
