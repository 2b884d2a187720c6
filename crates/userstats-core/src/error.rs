use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by a userstats run.
///
/// Malformed purchase / login blobs are deliberately absent: they are handled
/// by [`crate::data_processors::decode_blob`] and never abort a run.
#[derive(Error, Debug)]
pub enum StatsError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A parquet file could not be opened or its metadata decoded.
    #[error("Failed to read parquet file {path}: {source}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// A record batch could not be decoded or a column could not be cast.
    #[error("Failed to decode record batch from {path}: {source}")]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    /// A file is missing one of the configured columns.
    #[error("Column '{column}' not found in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// The configured input directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// The file-name pattern is not a valid glob.
    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A chart could not be drawn or written.
    #[error("Render error: {0}")]
    Render(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the userstats crates.
pub type Result<T> = std::result::Result<T, StatsError>;
