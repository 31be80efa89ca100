//! Failure conditions of the build pipeline and the query layer
//!
//! Build stages propagate these inside [`anyhow::Error`] alongside context
//! about what they were doing, so they can still be recovered with
//! `downcast_ref::<Error>()`. Query operations return them directly.

use std::path::PathBuf;
use thiserror::Error;

/// Things that can go wrong while building or querying the lookup tables
#[derive(Debug, Error)]
pub enum Error {
    /// A raw input record could not be understood
    #[error("malformed input record in {}: {reason}", .path.display())]
    InputFormat { path: PathBuf, reason: String },

    /// Two distinct words hash to the same lookup key
    #[error("hash collision in bucket {prefix}: {first:?} and {second:?} both map to suffix {suffix}")]
    HashCollision {
        prefix: String,
        suffix: String,
        first: Box<str>,
        second: Box<str>,
    },

    /// Some bucket tables are missing from a directory that is being packaged
    #[error(
        "{} of the 256 bucket files are missing from {}: {}",
        .missing.len(),
        .dir.display(),
        .missing.join(", ")
    )]
    IncompletePackage { dir: PathBuf, missing: Vec<String> },

    /// The lookup tables are not available locally
    #[error("frequency data is not installed at {}, run `gngram-counter install` first", .path.display())]
    DataNotInstalled { path: PathBuf },

    /// A Parquet table exists but does not follow the expected layout
    #[error("table {} is corrupt: {reason}", .path.display())]
    CorruptTable { path: PathBuf, reason: String },

    /// Underlying filesystem error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Error from the Parquet encoder/decoder
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error from Arrow array manipulation
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Result type of query operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
