use std::path::PathBuf;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported file format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("at least one search field is required")]
    MissingFields,

    #[error("a file id is required")]
    MissingFileId,

    #[error("file not found: {0}")]
    FileNotFound(u64),

    #[error("invalid query: {0}")]
    Validation(String),

    #[error("another ingestion is already in progress")]
    IngestionBusy,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
